use envconfig::Envconfig;

#[derive(Envconfig)]
pub struct Config {
    /// Without a database the portal runs on the in-memory store.
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: Option<String>,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "ADMIN_USERNAME")]
    pub admin_username: String,
    /// argon2 PHC string, see the `hash_password` binary.
    #[envconfig(from = "ADMIN_PASSWORD_HASH")]
    pub admin_password_hash: String,
    /// base64 encoded HMAC key for session tokens.
    #[envconfig(from = "SESSION_SECRET")]
    pub session_secret: String,
    #[envconfig(from = "SESSION_TTL_HOURS", default = "24")]
    pub session_ttl_hours: u64,

    #[envconfig(from = "SMTP_RELAY", default = "smtp.gmail.com")]
    pub smtp_relay: String,
    #[envconfig(from = "EMAIL_USERNAME")]
    pub email_username: Option<String>,
    #[envconfig(from = "EMAIL_PASSWORD")]
    pub email_password: Option<String>,
    #[envconfig(from = "EMAIL_FROM_NAME", default = "Coding Club")]
    pub email_from_name: String,

    #[envconfig(from = "CLUB_NAME", default = "Coding Club")]
    pub club_name: String,
    #[envconfig(from = "FRONTEND_ORIGIN")]
    pub frontend_origin: Option<String>,
}
