/*
 * Copyright 2023 Google LLC
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

mod config;
mod metrics;

use hyper::{HeaderMap, Method, StatusCode};
use tracing::debug;

use self::metrics::Metrics;
use crate::{
    filters::prelude::*,
    info::DynContainerInfoLookup,
    request::{
        check_account_format, check_container_format, check_path_header, config_true_value,
        header_str, list_from_csv, plain_text, split_path, unquote, valid_api_version,
        RequestError, DESTINATION, DESTINATION_ACCOUNT, ROLES, SERVICE_ROLES,
    },
};

pub use config::Config;

/// Methods that modify a container or its objects.
pub const WRITE_METHODS: &[&str] = &["COPY", "POST", "PUT", "DELETE"];

/// Key of the container user metadata holding the restriction flag.
pub const WRITE_RESTRICTED_KEY: &str = "write-restricted";

/// Header that sets [`WRITE_RESTRICTED_KEY`] on a container.
pub const WRITE_RESTRICTED_HEADER: &str = "x-container-meta-write-restricted";

const DESTINATION_FORMAT: &str =
    "Destination header must be of the form <container name>/<object name>";
const HEADER_MODIFICATION_DENIED: &str =
    "User is not allowed to modify the write-restricted header.";
const CONTAINER_RESTRICTED: &str = "Writes are restricted for this container.";

/// Restricts writes into containers that are flagged with
/// `X-Container-Meta-Write-Restricted: true` to callers holding one of the
/// configured roles.
///
/// Callers without one of those roles may not set or change the flag either,
/// otherwise they could lock themselves out of their own containers.
pub struct WriteRestriction {
    allowed_roles: Vec<String>,
    container_info: DynContainerInfoLookup,
    next: DynHandler,
    metrics: Metrics,
}

impl WriteRestriction {
    fn new(config: Config, next: NextHandler, metrics: Metrics) -> Self {
        Self {
            allowed_roles: config.allowed_roles,
            container_info: next.container_info(),
            next: next.handler(),
            metrics,
        }
    }

    /// Whether the caller holds one of the allowed roles, either as a user
    /// role or as a service role.
    fn has_allowed_role(&self, headers: &HeaderMap) -> bool {
        let roles = list_from_csv(header_str(headers, ROLES).unwrap_or_default());
        let service_roles = list_from_csv(header_str(headers, SERVICE_ROLES).unwrap_or_default());

        self.allowed_roles
            .iter()
            .any(|role| roles.contains(role) || service_roles.contains(role))
    }

    /// Whether `container` has its restriction flag set to a true value, as
    /// seen with the caller's credentials.
    async fn write_restricted_container(
        &self,
        account: &str,
        container: &str,
        caller: &HeaderMap,
    ) -> Result<bool, FilterError> {
        let info = self
            .container_info
            .lookup(account, container, caller)
            .await?;

        Ok(info
            .meta(WRITE_RESTRICTED_KEY)
            .map_or(false, config_true_value))
    }
}

/// Returns `true` for the methods in [`WRITE_METHODS`].
pub fn is_write_method(method: &Method) -> bool {
    WRITE_METHODS.contains(&method.as_str())
}

/// Returns the `(account, container)` a write request modifies, or `None` if
/// the request does not address a container or object.
///
/// A `COPY` writes into its `Destination` (and, if given,
/// `Destination-Account`) rather than into the path it was sent to.
fn write_target(request: &Request) -> Result<Option<(String, String)>, RequestError> {
    let path = unquote(request.uri().path());
    let (mut account, mut container) = match split_path(&path, 3, 4, true)?.as_slice() {
        [Some(version), Some(account), Some(container), _] if valid_api_version(version) => {
            (account.to_string(), container.to_string())
        }
        _ => return Ok(None),
    };

    let headers = request.headers();
    if request.method().as_str() == "COPY" && headers.contains_key(DESTINATION) {
        let destination = check_path_header(headers, DESTINATION, 2, DESTINATION_FORMAT)?;
        container = check_container_format(&destination[0])?.to_owned();

        if let Some(value) = headers.get(DESTINATION_ACCOUNT) {
            let value = String::from_utf8_lossy(value.as_bytes());
            account = check_account_format(&unquote(&value))?.to_owned();
        }
    }

    Ok(Some((account, container)))
}

impl StaticFilter for WriteRestriction {
    const NAME: &'static str = "swift.filters.write_restriction.v1.WriteRestriction";
    type Configuration = Config;

    fn try_from_config(
        config: Option<Self::Configuration>,
        next: NextHandler,
    ) -> Result<Self, CreationError> {
        Ok(Self::new(config.unwrap_or_default(), next, Metrics::new()?))
    }
}

#[async_trait::async_trait]
impl Handler for WriteRestriction {
    #[cfg_attr(feature = "instrument", tracing::instrument(skip_all))]
    async fn handle(&self, request: Request) -> Result<Response, FilterError> {
        if self.allowed_roles.is_empty() || !is_write_method(request.method()) {
            return self.next.handle(request).await;
        }

        let (account, container) = match write_target(&request) {
            Ok(Some(target)) => target,
            // Not a resource request, which is for the rest of the pipeline
            // to answer.
            Ok(None) | Err(RequestError::InvalidPath(_)) => {
                return self.next.handle(request).await;
            }
            Err(error) => return Err(error.into()),
        };

        if self.has_allowed_role(request.headers()) {
            debug!(%account, %container, method = %request.method(), "write allowed by role");
            return self.next.handle(request).await;
        }

        if request.headers().contains_key(WRITE_RESTRICTED_HEADER) {
            debug!(%account, %container, action = "Deny", "attempt to modify the write restriction");
            self.metrics.rejected_header.inc();
            return Ok(plain_text(
                StatusCode::METHOD_NOT_ALLOWED,
                HEADER_MODIFICATION_DENIED,
            ));
        }

        if self
            .write_restricted_container(&account, &container, request.headers())
            .await?
        {
            debug!(%account, %container, action = "Deny", "container is write restricted");
            self.metrics.rejected_container.inc();
            return Ok(plain_text(
                StatusCode::METHOD_NOT_ALLOWED,
                CONTAINER_RESTRICTED,
            ));
        }

        self.next.handle(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hyper::body::to_bytes;
    use tracing_test::traced_test;

    use super::*;
    use crate::test::{request, RecordingHandler, StaticLookup};

    struct Fixture {
        app: Arc<RecordingHandler>,
        lookup: Arc<StaticLookup>,
        filter: WriteRestriction,
    }

    fn fixture(allowed_roles: &[&str], lookup: StaticLookup) -> Fixture {
        let app = Arc::new(RecordingHandler::default());
        let lookup = Arc::new(lookup);
        let next = NextHandler::new(app.clone()).with_container_info(lookup.clone());
        let filter = WriteRestriction::try_from_config(
            Some(Config::new(allowed_roles.iter().copied())),
            next,
        )
        .unwrap();

        Fixture {
            app,
            lookup,
            filter,
        }
    }

    fn restricted() -> StaticLookup {
        StaticLookup::default().with_meta("AUTH_test", "photos", WRITE_RESTRICTED_KEY, "true")
    }

    async fn body_string(response: Response) -> String {
        String::from_utf8(to_bytes(response.into_body()).await.unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn reads_are_never_restricted() {
        let f = fixture(&["admin"], restricted());

        for method in ["GET", "HEAD", "OPTIONS"] {
            let response = f
                .filter
                .handle(
                    request(method, "/v1/AUTH_test/photos/cat.jpg")
                        .header(ROLES, "member")
                        .body(hyper::Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, response.status());
        }

        assert_eq!(3, f.app.requests().len());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn restricted_container_rejects_writes() {
        let f = fixture(&["admin"], restricted());

        for method in WRITE_METHODS {
            let response = f
                .filter
                .handle(
                    request(method, "/v1/AUTH_test/photos/cat.jpg")
                        .header(ROLES, "member")
                        .body(hyper::Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());
            assert_eq!(CONTAINER_RESTRICTED, body_string(response).await);
        }

        assert!(f.app.requests().is_empty());
        assert_eq!(4, f.lookup.calls().len());
        assert!(logs_contain("container is write restricted"));
    }

    #[tokio::test]
    async fn allowed_roles_bypass_the_restriction() {
        let f = fixture(&["admin", "swiftreseller"], restricted());

        let response = f
            .filter
            .handle(
                request("PUT", "/v1/AUTH_test/photos/cat.jpg")
                    .header(ROLES, "member, admin")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());

        let response = f
            .filter
            .handle(
                request("POST", "/v1/AUTH_test/photos")
                    .header(SERVICE_ROLES, "swiftreseller")
                    .header(WRITE_RESTRICTED_HEADER, "false")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::OK, response.status());

        assert_eq!(2, f.app.requests().len());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn no_allowed_roles_disables_the_restriction() {
        let f = fixture(&[], restricted());

        let response = f
            .filter
            .handle(
                request("PUT", "/v1/AUTH_test/photos")
                    .header(WRITE_RESTRICTED_HEADER, "true")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(1, f.app.requests().len());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn no_allowed_roles_skips_destination_checks() {
        let f = fixture(&[], restricted());

        let response = f
            .filter
            .handle(
                request("COPY", "/v1/AUTH_test/photos/o")
                    .header(DESTINATION, "malformed")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(StatusCode::OK, response.status());
        assert_eq!(1, f.app.requests().len());
    }

    #[tokio::test]
    async fn restricted_header_requires_allowed_role() {
        let f = fixture(&["admin"], StaticLookup::default());

        let response = f
            .filter
            .handle(
                request("POST", "/v1/AUTH_test/photos")
                    .header(ROLES, "member")
                    .header("X-Container-Meta-Write-Restricted", "false")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());
        assert_eq!(HEADER_MODIFICATION_DENIED, body_string(response).await);
        assert!(f.app.requests().is_empty());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn unrestricted_container_allows_writes() {
        let lookup = StaticLookup::default()
            .with_meta("AUTH_test", "open", WRITE_RESTRICTED_KEY, "false")
            .with_meta("AUTH_test", "other", "color", "blue");
        let f = fixture(&["admin"], lookup);

        for path in [
            "/v1/AUTH_test/open/o",
            "/v1/AUTH_test/other/o",
            "/v1/AUTH_test/missing/o",
        ] {
            let response = f
                .filter
                .handle(request("PUT", path).body(hyper::Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, response.status(), "{path}");
        }

        assert_eq!(3, f.app.requests().len());
        assert_eq!(
            vec![
                ("AUTH_test".to_owned(), "open".to_owned()),
                ("AUTH_test".to_owned(), "other".to_owned()),
                ("AUTH_test".to_owned(), "missing".to_owned()),
            ],
            f.lookup.calls()
        );
    }

    #[tokio::test]
    async fn truthy_flags() {
        for (value, restricted) in [
            ("TRUE", true),
            ("yes", true),
            ("1", true),
            ("on", true),
            ("false", false),
            ("", false),
            ("restricted", false),
        ] {
            let lookup =
                StaticLookup::default().with_meta("AUTH_test", "c", WRITE_RESTRICTED_KEY, value);
            let f = fixture(&["admin"], lookup);

            let response = f
                .filter
                .handle(request("DELETE", "/v1/AUTH_test/c/o").body(hyper::Body::empty()).unwrap())
                .await
                .unwrap();

            let expected = if restricted {
                StatusCode::METHOD_NOT_ALLOWED
            } else {
                StatusCode::OK
            };
            assert_eq!(expected, response.status(), "flag value {value:?}");
        }
    }

    #[tokio::test]
    async fn non_resource_paths_pass_through() {
        let f = fixture(&["admin"], restricted());

        for path in ["/info", "/v1/AUTH_test", "/v2/AUTH_test/photos/o", "/auth/v1.0", "/"] {
            let response = f
                .filter
                .handle(request("PUT", path).body(hyper::Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(StatusCode::OK, response.status(), "{path}");
        }

        assert_eq!(5, f.app.requests().len());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn copy_checks_the_destination() {
        let lookup = StaticLookup::default()
            .with_meta("AUTH_test", "newcontainer", WRITE_RESTRICTED_KEY, "true")
            .with_meta("AUTH_other", "archive", WRITE_RESTRICTED_KEY, "true");
        let f = fixture(&["admin"], lookup);

        let response = f
            .filter
            .handle(
                request("COPY", "/v1/AUTH_test/source/o")
                    .header(DESTINATION, "newcontainer/newobject")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());

        let response = f
            .filter
            .handle(
                request("COPY", "/v1/AUTH_test/source/o")
                    .header(DESTINATION, "/archive/o")
                    .header(DESTINATION_ACCOUNT, "AUTH_other")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());

        assert_eq!(
            vec![
                ("AUTH_test".to_owned(), "newcontainer".to_owned()),
                ("AUTH_other".to_owned(), "archive".to_owned()),
            ],
            f.lookup.calls()
        );
    }

    #[tokio::test]
    async fn copy_without_destination_checks_the_source() {
        let f = fixture(&["admin"], restricted());

        let response = f
            .filter
            .handle(request("COPY", "/v1/AUTH_test/photos/o").body(hyper::Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status());
        assert_eq!(
            vec![("AUTH_test".to_owned(), "photos".to_owned())],
            f.lookup.calls()
        );
    }

    #[tokio::test]
    async fn malformed_destination_is_a_client_error() {
        let f = fixture(&["admin"], restricted());

        let error = f
            .filter
            .handle(
                request("COPY", "/v1/AUTH_test/photos/o")
                    .header(DESTINATION, "newcontainer")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            FilterError::Request(RequestError::PreconditionFailed(DESTINATION_FORMAT.into())),
            error
        );
        assert_eq!(StatusCode::PRECONDITION_FAILED, error.status());

        let error = f
            .filter
            .handle(
                request("COPY", "/v1/AUTH_test/photos/o")
                    .header(DESTINATION, "c/o")
                    .header(DESTINATION_ACCOUNT, "")
                    .body(hyper::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            FilterError::Request(RequestError::PreconditionFailed(
                "Account name cannot be empty".into()
            )),
            error
        );

        assert!(f.app.requests().is_empty());
        assert!(f.lookup.calls().is_empty());
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let f = fixture(&["admin"], StaticLookup::failing("backend unavailable"));

        let error = f
            .filter
            .handle(request("PUT", "/v1/AUTH_test/c/o").body(hyper::Body::empty()).unwrap())
            .await
            .unwrap_err();

        assert_eq!(FilterError::Lookup("backend unavailable".into()), error);
        assert!(f.app.requests().is_empty());
    }

    #[test]
    fn write_methods() {
        assert!(is_write_method(&Method::PUT));
        assert!(is_write_method(&Method::from_bytes(b"COPY").unwrap()));
        assert!(!is_write_method(&Method::GET));
        assert!(!is_write_method(&Method::PATCH));
    }
}
