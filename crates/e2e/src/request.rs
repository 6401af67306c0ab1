//! Request-level checks against a running application

use tracing::debug;

use viewkit_common::Markup;

use crate::error::{E2eError, E2eResult};
use crate::spec::StatusExpectation;

/// Status and body of one request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Markup,
}

/// Issue a request and read the whole body
pub async fn fetch(client: &reqwest::Client, method: &str, url: &str) -> E2eResult<HttpResponse> {
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| E2eError::SpecParse(format!("invalid HTTP method: {}", method)))?;

    debug!("{} {}", method, url);
    let resp = client.request(method, url).send().await?;
    let status = resp.status().as_u16();
    let body = resp.text().await?;

    Ok(HttpResponse {
        status,
        body: Markup::from_trusted(body),
    })
}

/// Fail with an assertion error unless `status` satisfies `expectation`
pub fn expect_status(target: &str, status: u16, expectation: StatusExpectation) -> E2eResult<()> {
    if expectation.matches(status) {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(format!(
            "{} returned {}, expected {}",
            target, status, expectation
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::StatusClass;

    #[test]
    fn test_expect_status_message() {
        assert!(expect_status("GET /sample", 200, StatusExpectation::default()).is_ok());

        let err = expect_status(
            "GET /sample",
            500,
            StatusExpectation::Class(StatusClass::Success),
        )
        .unwrap_err();
        assert!(err.is_assertion());
        assert_eq!(
            err.to_string(),
            "Assertion failed: GET /sample returned 500, expected success (2xx)"
        );
    }
}
