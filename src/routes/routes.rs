use actix_web::web;

use crate::handlers::analytics_handlers::{get_partner_analytics, get_partner_conversions};
use crate::handlers::collect_handlers::{collect_beacon, collect_pixel};
use crate::handlers::health_handlers::health_check;
use crate::middlewares::api_key::ApiKeyAuth;

/// Configure the routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // Beacon intake stays open; partner pages hit it cross-origin
    cfg.route("/t/collect", web::post().to(collect_beacon));
    cfg.route("/t/collect", web::get().to(collect_pixel));
    cfg.route("/api/health/check", web::get().to(health_check));
    // Analytics requires the shared API key
    cfg.service(
        web::scope("/api")
            .wrap(ApiKeyAuth::from_env())
            .route(
                "/analytics/{partner_id}",
                web::get().to(get_partner_analytics),
            )
            .route(
                "/conversions/{partner_id}",
                web::get().to(get_partner_conversions),
            ),
    );
}
