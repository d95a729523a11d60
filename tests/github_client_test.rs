/// Integration tests for the GitHub client
///
/// Exercises the client against a mock HTTP server:
/// - request headers and bearer authentication
/// - `Link` header pagination
/// - status code classification (404, 5xx)
/// - transport failures
mod helpers;

use helpers::fixtures::{issue_json, repository_json};
use issue_mirror::adapters::github::GitHubClient;
use issue_mirror::domain::errors::DomainError;
use issue_mirror::domain::models::{IssueListQuery, StateFilter};
use issue_mirror::domain::ports::IssueSource;
use mockito::{Matcher, Server};

#[tokio::test]
async fn test_fetch_repository_sends_api_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octocat/Hello-World")
        .match_header("authorization", "Bearer ghp_test")
        .match_header("accept", "application/vnd.github+json")
        .match_header("x-github-api-version", "2022-11-28")
        .match_header("user-agent", "issue-mirror")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(repository_json().to_string())
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), Some("ghp_test".to_string()));
    let repository = client.fetch_repository("octocat", "Hello-World").await.unwrap();

    mock.assert_async().await;
    assert_eq!(repository.id, 1296269);
    assert_eq!(repository.full_name.as_deref(), Some("octocat/Hello-World"));
    assert_eq!(repository.owner.map(|o| o.login), Some("octocat".to_string()));
}

#[tokio::test]
async fn test_unauthenticated_client_sends_no_authorization() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octocat/Hello-World")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(repository_json().to_string())
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    client.fetch_repository("octocat", "Hello-World").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_issues_reads_next_page_from_link_header() {
    let mut server = Server::new_async().await;
    let link = format!(
        r#"<{0}/repositories/1296269/issues?state=open&page=3&per_page=2>; rel="next", <{0}/repositories/1296269/issues?state=open&page=5&per_page=2>; rel="last""#,
        server.url()
    );
    let body = serde_json::json!([issue_json(1, 1), issue_json(2, 2)]);
    let mock = server
        .mock("GET", "/repos/octocat/Hello-World/issues")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("state".into(), "open".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("per_page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("link", link.as_str())
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    let query = IssueListQuery {
        state: StateFilter::Open,
        page: 2,
        per_page: 2,
    };
    let page = client.list_issues("octocat", "Hello-World", &query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.issues.len(), 2);
    assert_eq!(page.next_page, Some(3));
}

#[tokio::test]
async fn test_last_page_has_no_next() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World/issues")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    let page = client
        .list_issues("octocat", "Hello-World", &IssueListQuery::first_page(StateFilter::All, 100))
        .await
        .unwrap();

    assert!(page.issues.is_empty());
    assert_eq!(page.next_page, None);
}

#[tokio::test]
async fn test_missing_issue_is_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World/issues/999")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    let err = client.get_issue("octocat", "Hello-World", 999).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_server_error_is_remote_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World/issues/7")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    match client.get_issue("octocat", "Hello-World", 7).await.unwrap_err() {
        DomainError::Remote { status, message } => {
            assert_eq!(status, 502);
            assert!(message.contains("bad gateway"));
        }
        other => panic!("expected Remote error, got {other}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_serialization_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/repos/octocat/Hello-World/issues/7")
        .with_status(200)
        .with_body(r#"{"id": "not a number"}"#)
        .create_async()
        .await;

    let client = GitHubClient::new(server.url(), None);
    let err = client.get_issue("octocat", "Hello-World", 7).await.unwrap_err();
    assert!(matches!(err, DomainError::SerializationError(_)));
}

#[tokio::test]
async fn test_connection_failure_is_transient() {
    // Nothing listens on the discard port.
    let client = GitHubClient::new("http://127.0.0.1:9", None);
    let err = client.fetch_repository("octocat", "Hello-World").await.unwrap_err();
    assert!(matches!(err, DomainError::TransientIo { .. }), "unexpected error: {err}");
}
