use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use log::{info, warn};
use poem::{
    http::StatusCode,
    listener::TcpListener,
    middleware::{CookieJarManager, Cors, Tracing},
    web::{cookie::CookieJar, RemoteAddr},
    Endpoint, EndpointExt, Response, Route,
};
use poem_openapi::{
    param::Path,
    payload::Json,
    registry::{MetaMediaType, MetaResponse, MetaResponses, Registry},
    types::{ToJSON, Type},
    ApiResponse, Object, OpenApi, OpenApiService,
};

use geoip_locator::{
    cache::CookieLocationCache,
    location::LocationRecord,
    locator::Locator,
    providers::{self, GeoProvider, LocateError, MaxmindSettings, MaxmindTransport, ProviderName},
};

#[derive(Debug, Parser)]
struct Cli {
    #[clap(long, env, default_value = "3000", help = "Port to listen on")]
    port: u16,
    #[clap(
        long,
        env,
        value_enum,
        default_value = "maxmind",
        help = "Geolocation service to use"
    )]
    service: ProviderName,
    #[clap(
        long,
        env,
        value_enum,
        default_value = "local-database",
        help = "Whether to query a local MaxMind database or the MaxMind web service"
    )]
    maxmind_type: MaxmindTransport,
    #[clap(
        long,
        env,
        default_value = "GeoIP2-City.mmdb",
        help = "Path to the MaxMind City database"
    )]
    maxmind_database: PathBuf,
    #[clap(long, env, help = "MaxMind account ID for the web service")]
    maxmind_account_id: Option<String>,
    #[clap(long, env, help = "MaxMind license key for the web service")]
    maxmind_license_key: Option<String>,
    #[clap(
        long,
        env,
        default_value = "https://geoip.maxmind.com",
        help = "Base URL of the MaxMind web service"
    )]
    maxmind_endpoint: String,
    #[clap(
        long,
        env,
        default_value = "5",
        help = "MaxMind web service request timeout in seconds"
    )]
    maxmind_timeout: u64,
    #[clap(
        long,
        env,
        default_value = "geoip-location",
        help = "Name of the cookie caching the client location"
    )]
    cookie_name: String,
    #[clap(
        long,
        env,
        default_value = "10080",
        help = "Lifetime of the location cookie in minutes"
    )]
    cookie_ttl: u64,
}

impl Cli {
    fn cookie_ttl(&self) -> anyhow::Result<Duration> {
        match self.cookie_ttl.checked_mul(60) {
            Some(seconds) => Ok(Duration::from_secs(seconds)),
            None => anyhow::bail!("cookie TTL of {} minutes is out of range", self.cookie_ttl),
        }
    }

    fn maxmind_settings(&self) -> MaxmindSettings {
        MaxmindSettings {
            transport: self.maxmind_type,
            database: self.maxmind_database.clone(),
            account_id: self.maxmind_account_id.clone(),
            license_key: self.maxmind_license_key.clone(),
            endpoint: self.maxmind_endpoint.clone(),
            timeout: Duration::from_secs(self.maxmind_timeout),
        }
    }
}

struct Api {
    provider: Box<dyn GeoProvider>,
    cookie_name: String,
    cookie_ttl: Duration,
}

#[derive(Debug)]
pub enum ApiError {
    IpAddressNotFound,
    LookupFailed,
}

#[derive(Debug, Object)]
struct ApiErrorResponse {
    code: u32,
    message: String,
}

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
struct IpGeolocation {
    ip: String,
    iso_code: String,
    country: String,
    city: String,
    state: String,
    postal_code: String,
    lat: f64,
    lon: f64,
}

impl Api {
    fn new(provider: Box<dyn GeoProvider>, cookie_name: String, cookie_ttl: Duration) -> Self {
        Self {
            provider,
            cookie_name,
            cookie_ttl,
        }
    }
}

#[OpenApi]
impl Api {
    #[oai(path = "/location", method = "get")]
    /// Gets the location of the caller, cached in a cookie between requests
    async fn get_own_location(
        &self,
        remote_addr: &RemoteAddr,
        cookie_jar: &CookieJar,
    ) -> Result<Json<IpGeolocation>, ApiError> {
        let cache = CookieLocationCache::new(cookie_jar, &self.cookie_name);
        let mut locator = Locator::new(remote_ipv4(remote_addr), self.provider.as_ref(), &cache)
            .with_cache_ttl(self.cookie_ttl);

        let location = locator.resolve(None).await?;
        Ok(Json(location.into()))
    }

    #[oai(path = "/location/:ip_address", method = "get")]
    /// Gets the location of an IPv4 address
    async fn get_location(
        &self,
        remote_addr: &RemoteAddr,
        cookie_jar: &CookieJar,
        ip_address: Path<String>,
    ) -> Result<Json<IpGeolocation>, ApiError> {
        let cache = CookieLocationCache::new(cookie_jar, &self.cookie_name);
        let mut locator = Locator::new(remote_ipv4(remote_addr), self.provider.as_ref(), &cache);

        let location = locator.resolve(Some(&ip_address.0)).await?;
        Ok(Json(location.into()))
    }
}

/// Dotted-quad form of the peer address, or an empty string when the peer isn't IPv4.
fn remote_ipv4(remote_addr: &RemoteAddr) -> String {
    match remote_addr.as_socket_addr().map(SocketAddr::ip) {
        Some(IpAddr::V4(ip)) => ip.to_string(),
        Some(IpAddr::V6(ip)) => ip
            .to_ipv4_mapped()
            .map(|ip| ip.to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

impl From<LocationRecord> for IpGeolocation {
    fn from(value: LocationRecord) -> Self {
        Self {
            ip: value.ip,
            iso_code: value.iso_code,
            country: value.country,
            city: value.city,
            state: value.state,
            postal_code: value.postal_code,
            lat: value.lat,
            lon: value.lon,
        }
    }
}

impl From<LocateError> for ApiError {
    fn from(value: LocateError) -> Self {
        match value {
            LocateError::NotFound(_) => Self::IpAddressNotFound,
            err => {
                warn!("Location lookup failed: {}", err);
                Self::LookupFailed
            }
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::IpAddressNotFound => StatusCode::NOT_FOUND,
            Self::LookupFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl ApiResponse for ApiError {
    fn meta() -> MetaResponses {
        let error_response = |status| MetaResponse {
            description: "",
            status: Some(status),
            content: vec![MetaMediaType {
                content_type: "application/json",
                schema: ApiErrorResponse::schema_ref(),
            }],
            headers: vec![],
        };

        MetaResponses {
            responses: vec![error_response(404), error_response(502)],
        }
    }

    fn register(registry: &mut Registry) {
        <ApiErrorResponse as Type>::register(registry);
    }
}

impl From<ApiError> for poem::Error {
    fn from(value: ApiError) -> Self {
        let status_code = value.status_code();
        let response: ApiErrorResponse = value.into();

        Self::from_response(
            Response::builder()
                .status(status_code)
                .content_type("application/json")
                .body(response.to_json_string()),
        )
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::IpAddressNotFound => Self {
                code: 101,
                message: "IP address not covered by the geolocation service".into(),
            },
            ApiError::LookupFailed => Self {
                code: 102,
                message: "Geolocation service unavailable".into(),
            },
        }
    }
}

fn build_app(api: Api) -> impl Endpoint {
    let api_service = OpenApiService::new(api, "geoip-locator", env!("CARGO_PKG_VERSION"));

    Route::new()
        .nest("/openapi", api_service.spec_endpoint())
        .nest("/swagger", api_service.swagger_ui())
        .nest(
            "/",
            api_service
                .with(CookieJarManager::new())
                .with(Cors::new())
                .with(Tracing),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "geoip_locator=debug,poem=debug");
    }
    env_logger::init();

    let cli = Cli::parse();

    let provider = providers::build(cli.service, &cli.maxmind_settings())?;
    info!(
        "Using {:?} geolocation service ({:?})",
        cli.service, cli.maxmind_type
    );

    let cookie_ttl = cli.cookie_ttl()?;
    let api = Api::new(provider, cli.cookie_name, cookie_ttl);
    let app = build_app(api);

    let server = poem::Server::new(TcpListener::bind((Ipv4Addr::new(0, 0, 0, 0), cli.port)));
    info!("Listening on 0.0.0.0:{}", cli.port);

    server
        .run_with_graceful_shutdown(
            app,
            async {
                #[cfg(unix)]
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        let _ = signal.recv().await;
                    }
                    Err(err) => {
                        warn!("Unable to listen for SIGTERM: {}", err);
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }

                #[cfg(not(unix))]
                let _ = tokio::signal::ctrl_c().await;
            },
            None,
        )
        .await?;

    Ok(())
}
