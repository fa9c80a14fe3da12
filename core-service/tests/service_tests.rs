use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use core_service::{CommandOutcome, CoreConfig, CoreDependencies, CoreError, CoreEvent, CoreService};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Origin {}

    #[async_trait::async_trait]
    impl HttpClient for Origin {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn shell_origin() -> MockOrigin {
    let mut origin = MockOrigin::new();
    origin
        .expect_execute()
        .returning(|_| Ok(HttpResponse::new(200).with_body("<html></html>")));
    origin
}

#[tokio::test]
async fn test_start_installs_shell_and_activates() {
    let deps = CoreDependencies::new(Arc::new(shell_origin()));
    let builder = CoreConfig::builder()
        .version("v7")
        .origin("https://music.test/");
    let service = CoreService::with_dependencies(builder, deps).unwrap();
    let mut events = service.subscribe_events();

    let report = service.start().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.precached, vec!["https://music.test/".to_string()]);
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Lifecycle(_)
    ));

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.cache("shell-v7").unwrap().entries, 1);
}

#[tokio::test]
async fn test_missing_version_is_a_runtime_error() {
    let deps = CoreDependencies::new(Arc::new(shell_origin()));

    let result = CoreService::with_dependencies(CoreConfig::builder(), deps);

    assert!(matches!(result, Err(CoreError::Runtime(_))));
}

#[tokio::test]
async fn test_control_messages_pass_through() {
    let deps = CoreDependencies::new(Arc::new(shell_origin()));
    let service =
        CoreService::with_dependencies(CoreConfig::builder().version("v1"), deps).unwrap();

    let outcome = service
        .handle_message(r#"{"type":"CLEAR_AUDIO_CACHE"}"#)
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::AudioCacheCleared { removed: 0 });

    let invalid = service.handle_message("not json").await;
    assert!(matches!(invalid, Err(CoreError::Cache(_))));

    service.shutdown().await;
}
