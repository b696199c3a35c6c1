use actix_web::{HttpResponse, Responder, Result, error, web};
use futures_util::StreamExt;
use mongodb::bson::doc;

use crate::models::conversion::ConversionRecord;
use crate::state::app_state::AppState;
use crate::structs::collect::{ConversionListEntry, ConversionListParams, PartnerAnalyticsResponse};

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Attribution totals for one partner
pub async fn get_partner_analytics(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder> {
    let partner_id = path.into_inner();
    let conversions = app_state.db.collection::<ConversionRecord>("conversions");

    let total = conversions
        .count_documents(doc! {"partner_id": &partner_id})
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let provisional = conversions
        .count_documents(doc! {"partner_id": &partner_id, "provisional": true})
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    // Distinct hashed reporters, the same unique-visitor notion the click
    // side uses
    let unique_reporters = conversions
        .distinct("reporter_hash", doc! {"partner_id": &partner_id})
        .await
        .map(|reporters| reporters.len())
        .unwrap_or(0);

    let analytics = PartnerAnalyticsResponse {
        partner_id,
        conversions: total,
        confident: total - provisional,
        provisional,
        unique_reporters,
    };

    Ok(HttpResponse::Ok().json(analytics))
}

/// Most recent conversions for one partner
pub async fn get_partner_conversions(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ConversionListParams>,
) -> Result<impl Responder> {
    let partner_id = path.into_inner();
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);

    let conversions = app_state.db.collection::<ConversionRecord>("conversions");

    let mut cursor = conversions
        .find(doc! {"partner_id": &partner_id})
        .sort(doc! {"received_at": -1})
        .limit(limit)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let mut entries = Vec::new();
    while let Some(result) = cursor.next().await {
        if let Ok(record) = result {
            entries.push(ConversionListEntry {
                id: record.id.map(|oid| oid.to_hex()),
                event_id: record.event_id,
                identifier: record.identifier,
                provisional: record.provisional,
                matched_pattern: record.matched_pattern,
                timestamp: record.timestamp,
                received_at: record.received_at,
            });
        }
    }

    Ok(HttpResponse::Ok().json(entries))
}
