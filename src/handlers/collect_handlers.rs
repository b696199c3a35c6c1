use actix_web::{HttpRequest, HttpResponse, Responder, Result, error, http, web};
use log::debug;
use mongodb::bson::{doc, to_document};
use validator::Validate;

use crate::models::conversion::ConversionRecord;
use crate::state::app_state::AppState;
use crate::structs::collect::{CollectRequest, CollectResponse, PixelRequest};
use crate::utils::hash_ip::hash_ip;

fn record_from_request(req: &HttpRequest, payload: CollectRequest) -> ConversionRecord {
    // Reporter context, hashed/stripped the same way redirect visitors are
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let reporter_hash = Some(hash_ip(&ip));

    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    ConversionRecord::from_beacon(payload, reporter_hash, user_agent)
}

/// Accept a conversion beacon. Inserts are keyed on the client-minted
/// event_id, so a beacon whose first delivery actually landed before the
/// client retried is stored exactly once.
pub async fn collect_beacon(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(payload): web::Json<CollectRequest>,
) -> Result<impl Responder> {
    if let Err(errors) = payload.validate() {
        return Ok(HttpResponse::BadRequest().json(errors));
    }

    if !payload.has_attribution_key() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Either identifier or fingerprint is required"
        })));
    }

    let record = record_from_request(&req, payload);
    let event_id = record.event_id.clone();

    let conversions = app_state.db.collection::<ConversionRecord>("conversions");
    let insert = to_document(&record)
        .map_err(|e| error::ErrorInternalServerError(format!("Serialization error: {}", e)))?;

    conversions
        .update_one(
            doc! {"event_id": &event_id},
            doc! {"$setOnInsert": insert},
        )
        .upsert(true)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    Ok(HttpResponse::Accepted().json(CollectResponse {
        accepted: true,
        event_id,
    }))
}

/// Pixel-style GET variant of the beacon. Responds immediately and writes
/// in the background so the reporting page is never held up.
pub async fn collect_pixel(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PixelRequest>,
) -> Result<impl Responder> {
    let payload = query.into_inner().into_collect_request();

    if payload.validate().is_err() || !payload.has_attribution_key() {
        return Ok(HttpResponse::BadRequest().finish());
    }

    let record = record_from_request(&req, payload);
    let conversions = app_state.db.collection::<ConversionRecord>("conversions");

    actix_web::rt::spawn(async move {
        let insert = match to_document(&record) {
            Ok(insert) => insert,
            Err(e) => {
                debug!("conversion {} not serializable: {}", record.event_id, e);
                return;
            }
        };

        let _ = conversions
            .update_one(
                doc! {"event_id": &record.event_id},
                doc! {"$setOnInsert": insert},
            )
            .upsert(true)
            .await;
    });

    Ok(HttpResponse::NoContent().finish())
}
