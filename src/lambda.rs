//! Push mode: serving SQS event batches from the AWS Lambda runtime.

use std::sync::Arc;

use lambda_runtime::{service_fn, LambdaEvent};

use crate::{ingress::event::SqsEvent, router::Router, transport::Transport};

/// Whether the process was started by the Lambda runtime, judged from the
/// variables it sets for every function.
pub fn running_in_lambda(env: impl Fn(&str) -> Option<String>) -> bool {
    env("AWS_EXECUTION_ENV").is_some_and(|v| v.starts_with("AWS_Lambda"))
        || env("AWS_LAMBDA_RUNTIME_API").is_some_and(|v| !v.is_empty())
}

/// Routes one invocation's batch. The first failing record fails the whole
/// invocation so that Lambda redelivers the batch.
pub async fn handle<T: Transport>(
    router: &Router<T>,
    event: LambdaEvent<SqsEvent>,
) -> Result<(), lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    tracing::debug!(
        request_id = %context.request_id,
        records = payload.records.len(),
        "handling invocation"
    );

    router.handle_event(payload).await?;
    Ok(())
}

/// Serves invocations until the runtime shuts the function down.
pub async fn serve<T: Transport>(router: Arc<Router<T>>) -> eyre::Result<()> {
    tracing::info!("serving lambda invocations");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let router = router.clone();
        async move { handle(&router, event).await }
    }))
    .await
    .map_err(|e| eyre::eyre!("lambda runtime failed: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use lambda_runtime::Context;

    use super::*;
    use crate::{
        config::RouterConfig,
        ingress::event::SqsEventRecord,
        transport::memory::InMemoryTransport,
    };

    const INCOMING: &str = "https://sqs.example/incoming";
    const OUTGOING: &str = "https://sqs.example/outgoing";

    fn router() -> Router<InMemoryTransport> {
        Router::builder()
            .transport(InMemoryTransport::new())
            .config(RouterConfig {
                incoming_queue_url: INCOMING.into(),
                outgoing_queue_url: OUTGOING.into(),
            })
            .build()
    }

    fn record(message_id: &str, receipt_handle: &str) -> SqsEventRecord {
        SqsEventRecord {
            message_id: message_id.into(),
            receipt_handle: receipt_handle.into(),
            body: format!("body of {message_id}"),
            ..Default::default()
        }
    }

    #[test]
    fn test_running_in_lambda() {
        let cases = vec![
            (vec![], false),
            (vec![("AWS_EXECUTION_ENV", "AWS_Lambda_provided.al2023")], true),
            (vec![("AWS_EXECUTION_ENV", "AWS_ECS_FARGATE")], false),
            (vec![("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001")], true),
            (vec![("AWS_LAMBDA_RUNTIME_API", "")], false),
        ];

        for (vars, expected) in cases {
            let env: HashMap<&str, &str> = vars.iter().copied().collect();
            assert_eq!(
                running_in_lambda(|key| env.get(key).map(|v| v.to_string())),
                expected,
                "environment {vars:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_handle_routes_batch() {
        let router = router();
        for body in ["a", "b"] {
            router.transport().enqueue(INCOMING, body, HashMap::new());
        }
        let received = router.transport().receive(INCOMING, 2, 0).await.unwrap();
        let records = received
            .into_iter()
            .map(|msg| {
                let msg = msg.unwrap();
                record(&msg.id, &msg.receipt_handle)
            })
            .collect();

        let event = LambdaEvent::new(SqsEvent { records }, Context::default());
        handle(&router, event).await.unwrap();

        assert_eq!(router.transport().sent_to(OUTGOING).len(), 2);
        assert_eq!(router.transport().deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_fails_invocation_on_first_error() {
        let router = router();
        let event = LambdaEvent::new(
            SqsEvent {
                records: vec![record("", "r-1"), record("m-2", "r-2")],
            },
            Context::default(),
        );

        let err = handle(&router, event).await.unwrap_err();

        assert!(err.to_string().contains("messageId"), "error was {err}");
        assert!(router.transport().sent().is_empty());
    }
}
