use url::Url;

/// A click identifier observed in a landing URL, together with the partner
/// that sent the visitor, if the link carried one.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedClick {
    pub identifier: String,
    pub partner_id: Option<String>,
}

/// Inspect a URL's query string for the configured click-id parameter.
///
/// Blank values count as absent, so a dangling `?click_id=` never produces
/// an empty identifier that would clobber a previously stored one.
pub fn capture_from_url(url: &Url, click_param: &str, partner_param: &str) -> Option<CapturedClick> {
    let mut identifier = None;
    let mut partner_id = None;

    for (key, value) in url.query_pairs() {
        if key == click_param && identifier.is_none() && !value.is_empty() {
            identifier = Some(value.into_owned());
        } else if key == partner_param && partner_id.is_none() && !value.is_empty() {
            partner_id = Some(value.into_owned());
        }
    }

    identifier.map(|identifier| CapturedClick {
        identifier,
        partner_id,
    })
}
