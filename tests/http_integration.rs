//! Integration tests for the gateway client using wiremock
//!
//! These tests run [`HttpCloud`] against a mocked gateway and check request
//! paths, authentication, body shapes and status handling.

use cost_saver::cloud::api::{ComputeApi, ContainerApi, DatabaseApi, TagStore};
use cost_saver::cloud::client::HttpCloud;
use cost_saver::cloud::http::{api_status, format_api_error};
use cost_saver::cloud::{Account, AccountRegistry, CredentialHandle};
use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_ARN: &str = "arn:aws:ecs:us-east-1:1:service/prod/web";
const ENCODED_SERVICE_ARN: &str = "arn%3Aaws%3Aecs%3Aus-east-1%3A1%3Aservice%2Fprod%2Fweb";

fn account(server: &MockServer) -> Account {
    Account::new("1", "prod", "us-east-1", CredentialHandle::new("AKID", "SECRET")).with_endpoint(server.uri())
}

fn cloud() -> HttpCloud {
    HttpCloud::new().expect("client should build")
}

/// Module for compute and database calls
mod instance_tests {
    use super::*;

    /// Listing sends basic auth and parses camelCase records
    #[tokio::test]
    async fn test_describe_instances_with_basic_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/instances"))
            .and(basic_auth("AKID", "SECRET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "instances": [
                    {
                        "instanceId": "i-1",
                        "state": "running",
                        "instanceType": "t3.micro",
                        "tags": [{"key": "Name", "value": "api"}]
                    },
                    {"instanceId": "i-2", "state": "stopped"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let instances = cloud().describe_instances(&account(&server)).await.unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].instance_id, "i-1");
        assert_eq!(instances[0].instance_type, "t3.micro");
        assert_eq!(instances[1].state, "stopped");
        assert!(instances[1].tags.is_empty());
    }

    /// Missing list field is an empty listing
    #[tokio::test]
    async fn test_empty_listing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/database/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let databases = cloud().describe_db_instances(&account(&server)).await.unwrap();
        assert!(databases.is_empty());
    }

    /// Start accepts an empty 200 body
    #[tokio::test]
    async fn test_start_instance_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/compute/instances/i-1/start"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        cloud().start_instance(&account(&server), "i-1").await.unwrap();
    }

    /// 404 is carried as a status the adapters can match on
    #[tokio::test]
    async fn test_404_carries_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/instances/orders-db/stop"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "DBInstance orders-db not found"
            })))
            .mount(&server)
            .await;

        let err = cloud()
            .stop_db_instance(&account(&server), "orders-db")
            .await
            .unwrap_err();

        assert_eq!(api_status(&err), Some(404));
        assert_eq!(format_api_error(&err), "Resource not found.");
    }

    /// 5xx maps to a generic retry message
    #[tokio::test]
    async fn test_503_is_temporarily_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/instances"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = cloud().describe_instances(&account(&server)).await.unwrap_err();
        assert_eq!(api_status(&err), Some(503));
        assert_eq!(
            format_api_error(&err),
            "Provider temporarily unavailable. Please try again."
        );
    }

    /// Malformed JSON is an error without a status
    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/compute/instances"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = cloud().describe_instances(&account(&server)).await.unwrap_err();
        assert_eq!(api_status(&err), None);
    }
}

/// Module for container and tag calls
mod container_tests {
    use super::*;

    /// Cluster ARNs are percent-encoded into the path
    #[tokio::test]
    async fn test_list_services_encodes_cluster_arn() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(
                "/container/clusters/arn%3Aaws%3Aecs%3Aus-east-1%3A1%3Acluster%2Fprod/services",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "serviceArns": [SERVICE_ARN]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let services = cloud()
            .list_services(&account(&server), "arn:aws:ecs:us-east-1:1:cluster/prod")
            .await
            .unwrap();
        assert_eq!(services, vec![SERVICE_ARN.to_string()]);
    }

    /// Describe posts the service list and parses counts
    #[tokio::test]
    async fn test_describe_services_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/container/clusters/prod/services/describe"))
            .and(body_json(json!({"services": ["web"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [{
                    "serviceArn": SERVICE_ARN,
                    "serviceName": "web",
                    "desiredCount": 3,
                    "runningCount": 3,
                    "pendingCount": 0
                }]
            })))
            .mount(&server)
            .await;

        let records = cloud()
            .describe_services(&account(&server), "prod", &["web".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].desired_count, 3);
        assert_eq!(records[0].name(), "web");
    }

    /// Tag write, read and delete hit the tag endpoint for the service ARN
    #[tokio::test]
    async fn test_tag_calls() {
        let server = MockServer::start().await;
        let tags_path = format!("/container/tags/{}", ENCODED_SERVICE_ARN);

        Mock::given(method("POST"))
            .and(path(tags_path.as_str()))
            .and(body_json(json!({
                "tags": [{"key": "previous-desired-count", "value": "3"}]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(tags_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tags": [{"key": "previous-desired-count", "value": "3"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(tags_path.as_str()))
            .and(query_param("tagKeys", "previous-desired-count"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let cloud = cloud();
        let account = account(&server);

        cloud
            .write(&account, SERVICE_ARN, "previous-desired-count", "3")
            .await
            .unwrap();
        let value = cloud
            .read(&account, SERVICE_ARN, "previous-desired-count")
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("3"));
        assert_eq!(cloud.read(&account, SERVICE_ARN, "other").await.unwrap(), None);
        cloud
            .delete(&account, SERVICE_ARN, "previous-desired-count")
            .await
            .unwrap();
    }
}

/// Module for the full stop path through the fleet
mod fleet_tests {
    use super::*;
    use cost_saver::resource::fleet::Fleet;
    use cost_saver::resource::model::{ResourceKind, ResourceRef};
    use cost_saver::Error;
    use std::sync::Arc;

    fn fleet(server: &MockServer) -> Fleet {
        Fleet::with_provider(
            AccountRegistry::new(vec![account(server)]),
            Arc::new(cloud()),
        )
    }

    /// Stop writes the tag before zeroing capacity
    #[tokio::test]
    async fn test_stop_service_call_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/container/clusters/prod/services/describe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "services": [{
                    "serviceArn": SERVICE_ARN,
                    "serviceName": "web",
                    "desiredCount": 3,
                    "runningCount": 3
                }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(format!("/container/tags/{}", ENCODED_SERVICE_ARN)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/container/clusters/prod/services/web/update"))
            .and(body_json(json!({"desiredCount": 0})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ack = fleet(&server)
            .stop(ResourceKind::Container, "1", &ResourceRef::service("prod", "web"))
            .await
            .unwrap();
        assert!(ack.message.contains("was 3 tasks"));

        let tags_path = format!("/container/tags/{}", ENCODED_SERVICE_ARN);
        let requests = server.received_requests().await.unwrap();
        let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
        assert_eq!(
            paths,
            vec![
                "/container/clusters/prod/services/describe",
                tags_path.as_str(),
                "/container/clusters/prod/services/web/update",
            ]
        );
    }

    /// A 404 on describe becomes ServiceNotFound
    #[tokio::test]
    async fn test_missing_service_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/container/clusters/prod/services/describe"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fleet(&server)
            .start(ResourceKind::Container, "1", &ResourceRef::service("prod", "gone"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceNotFound { .. }));
    }

    /// A gateway error on VM start surfaces as a remote failure
    #[tokio::test]
    async fn test_compute_start_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/compute/instances/i-1/start"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = fleet(&server)
            .start(ResourceKind::Compute, "1", &ResourceRef::instance("i-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RemoteOperationFailed { .. }));
    }
}
