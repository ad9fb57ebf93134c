use std::{net::Ipv4Addr, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;

use super::{maxmind::CityResponse, GeoProvider, LocateError, RawRecord};

/// Client for the GeoIP2 City web service.
#[derive(Debug)]
pub struct MaxmindWebServiceProvider {
    client: reqwest::Client,
    endpoint: String,
    account_id: String,
    license_key: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: String,
    error: String,
}

impl MaxmindWebServiceProvider {
    pub fn new(
        endpoint: &str,
        account_id: &str,
        license_key: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            account_id: account_id.to_owned(),
            license_key: license_key.to_owned(),
        })
    }

    fn city_url(&self, ip_address: &Ipv4Addr) -> String {
        format!("{}/geoip/v2.1/city/{}", self.endpoint, ip_address)
    }
}

#[async_trait]
impl GeoProvider for MaxmindWebServiceProvider {
    async fn locate(&self, ip_address: Ipv4Addr) -> Result<RawRecord, LocateError> {
        let response = self
            .client
            .get(self.city_url(&ip_address))
            .basic_auth(&self.account_id, Some(&self.license_key))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let city: CityResponse = response.json().await?;
            return Ok(city.into());
        }

        let body = response.text().await?;
        match serde_json::from_str::<ServiceError>(&body) {
            Ok(err) if matches!(err.code.as_str(), "IP_ADDRESS_NOT_FOUND" | "IP_ADDRESS_RESERVED") => {
                Err(LocateError::NotFound(ip_address))
            }
            Ok(err) => Err(LocateError::Service {
                status: status.as_u16(),
                code: err.code,
                message: err.error,
            }),
            Err(_) => Err(LocateError::Service {
                status: status.as_u16(),
                code: String::new(),
                message: body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn test_provider(endpoint: &str) -> MaxmindWebServiceProvider {
        MaxmindWebServiceProvider::new(endpoint, "42", "secret", Duration::from_secs(5))
            .expect("client construction should not fail")
    }

    #[tokio::test]
    async fn test_locate_parses_city() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "city": { "names": { "en": "Mountain View" } },
            "country": { "iso_code": "US", "names": { "en": "United States" } },
            "location": { "latitude": 37.386, "longitude": -122.0838 },
            "postal": { "code": "94035" },
            "subdivisions": [{ "iso_code": "CA", "names": { "en": "California" } }],
            "traits": { "ip_address": "8.8.8.8" }
        });

        Mock::given(method("GET"))
            .and(path("/geoip/v2.1/city/8.8.8.8"))
            .and(header("authorization", "Basic NDI6c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .expect(1)
            .mount(&server)
            .await;

        let raw = test_provider(&server.uri())
            .locate(Ipv4Addr::new(8, 8, 8, 8))
            .await
            .expect("lookup should succeed");

        assert_eq!(raw.iso_code.as_deref(), Some("US"));
        assert_eq!(raw.country_name.as_deref(), Some("United States"));
        assert_eq!(raw.city_name.as_deref(), Some("Mountain View"));
        assert_eq!(raw.subdivision_code.as_deref(), Some("CA"));
        assert_eq!(raw.postal_code.as_deref(), Some("94035"));
        assert_eq!(raw.latitude, Some(37.386));
        assert_eq!(raw.longitude, Some(-122.0838));
    }

    #[tokio::test]
    async fn test_locate_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "IP_ADDRESS_NOT_FOUND",
                "error": "The value 11.0.0.1 is not in the database."
            })))
            .mount(&server)
            .await;

        let err = test_provider(&server.uri())
            .locate(Ipv4Addr::new(11, 0, 0, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, LocateError::NotFound(ip) if ip == Ipv4Addr::new(11, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_locate_service_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": "AUTHORIZATION_INVALID",
                "error": "You have supplied an invalid MaxMind account ID and/or license key."
            })))
            .mount(&server)
            .await;

        let err = test_provider(&server.uri())
            .locate(Ipv4Addr::new(8, 8, 8, 8))
            .await
            .unwrap_err();

        match err {
            LocateError::Service { status, code, .. } => {
                assert_eq!(status, 401);
                assert_eq!(code, "AUTHORIZATION_INVALID");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_locate_non_json_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let err = test_provider(&format!("{}/", server.uri()))
            .locate(Ipv4Addr::new(8, 8, 8, 8))
            .await
            .unwrap_err();

        assert!(matches!(err, LocateError::Service { status: 503, ref message, .. } if message == "Service Unavailable"));
    }
}
