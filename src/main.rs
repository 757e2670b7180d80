#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod repos;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::swagger_ui::{make_swagger_ui, SwaggerUIConfig};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, x-paystack-signature",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    println!("🚀 Academy API running");
    println!("📚 Swagger UI → http://localhost:8000/api/docs");

    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            routes![
                routes::health,
                // Auth
                routes::auth::register,
                routes::auth::login,
                routes::auth::refresh_token,
                routes::auth::get_me,
                // Application fee
                routes::application_fee::initiate_payment,
                routes::application_fee::verify_payment,
                routes::application_fee::get_status,
                routes::application_fee::check_paid,
                // Subscriptions
                routes::subscription::get_plans,
                routes::subscription::get_plan_by_type,
                routes::subscription::create_subscription,
                routes::subscription::make_payment,
                routes::subscription::verify_payment,
                routes::subscription::get_user_subscriptions,
                routes::subscription::get_active_subscription,
                routes::subscription::check_access,
                routes::subscription::get_user_transactions,
                routes::subscription::get_subscription_by_id,
                routes::subscription::get_subscription_transactions,
                routes::subscription::cancel_subscription,
                // Webhooks
                routes::webhook::paystack_webhook,
                // Admin
                routes::admin::payment_stats,
                routes::admin::application_fee_stats,
                routes::admin::gateway_transactions,
                routes::admin::create_plan,
                routes::admin::seed_plans,
                routes::admin::list_users,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, internal_error])
}
