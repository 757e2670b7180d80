use rocket::figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| "default-refresh-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment().extract_inner("jwt_expiry").unwrap_or(900)
    }

    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/academy".to_string())
    }

    pub fn mail_host() -> String {
        Self::figment()
            .extract_inner("mail_host")
            .unwrap_or_else(|_| "smtp.gmail.com".to_string())
    }

    pub fn mail_user() -> String {
        Self::figment().extract_inner("mail_user").unwrap_or_default()
    }

    pub fn mail_password() -> String {
        Self::figment()
            .extract_inner("mail_password")
            .unwrap_or_default()
    }

    pub fn mail_from() -> String {
        Self::figment()
            .extract_inner("mail_from")
            .unwrap_or_else(|_| "Academy <noreply@academy.local>".to_string())
    }

    pub fn app_url() -> String {
        Self::figment()
            .extract_inner("app_url")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
    }

    pub fn paystack_secret_key() -> String {
        Self::figment()
            .extract_inner("paystack_secret_key")
            .unwrap_or_default()
    }

    pub fn paystack_base_url() -> String {
        Self::figment()
            .extract_inner("paystack_base_url")
            .unwrap_or_else(|_| "https://api.paystack.co".to_string())
    }

    pub fn paystack_callback_url() -> Option<String> {
        Self::figment().extract_inner("paystack_callback_url").ok()
    }

    pub fn paystack_timeout_secs() -> u64 {
        Self::figment()
            .extract_inner("paystack_timeout_secs")
            .unwrap_or(30)
    }

    pub fn application_fee_amount() -> f64 {
        Self::figment()
            .extract_inner("application_fee_amount")
            .unwrap_or(20000.0)
    }
}
