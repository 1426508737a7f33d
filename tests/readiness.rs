// ABOUTME: Integration tests for the readiness waiter with HTTP and command probes.
// ABOUTME: HTTP probes run against a local test server; command probes use sh.

mod support;

use rollout::cancel::CancelToken;
use rollout::invoke::{Invocation, ProcessInvoker, ToolInvoker};
use rollout::readiness::{
    CommandProbe, HttpProbe, Probe, ProbeStatus, ReadinessCheck, ReadinessError, http_get,
    wait_until_ready,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::http_server::serve;

fn quick() -> ReadinessCheck {
    ReadinessCheck::new(Duration::from_millis(50), Duration::from_millis(600))
}

mod http {
    use super::*;

    #[tokio::test]
    async fn healthy_endpoint_is_ready() {
        support::init_tracing();
        let server = serve(&[("/health", 200, "status: healthy")]).await;
        let probe = HttpProbe::new("127.0.0.1", server.port, "/health").expect_body("healthy");

        wait_until_ready(&probe, quick(), &CancelToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_status_times_out_with_last_reason() {
        let server = serve(&[("/health", 503, "starting")]).await;
        let probe = HttpProbe::new("127.0.0.1", server.port, "/health");

        let started = Instant::now();
        let err = wait_until_ready(&probe, quick(), &CancelToken::new())
            .await
            .unwrap_err();

        match err {
            ReadinessError::Timeout { last, .. } => assert!(last.contains("503"), "{last}"),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn missing_token_is_not_ready() {
        let server = serve(&[("/health", 200, "degraded")]).await;
        let probe = HttpProbe::new("127.0.0.1", server.port, "/health").expect_body("healthy");

        match probe.check().await {
            ProbeStatus::NotReady(reason) => assert!(reason.contains("healthy")),
            ProbeStatus::Ready => panic!("body without token must not be ready"),
        }
    }

    #[tokio::test]
    async fn unreachable_port_is_not_ready() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = HttpProbe::new("127.0.0.1", port, "/health");
        assert!(matches!(probe.check().await, ProbeStatus::NotReady(_)));
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let server = serve(&[("/metrics", 200, "up 1\n")]).await;
        let response = http_get("127.0.0.1", server.port, "/metrics", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body, "up 1\n");

        let missing = http_get("127.0.0.1", server.port, "/nope", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);
        assert!(!missing.is_success());
    }
}

mod command {
    use super::*;

    fn invoker() -> Arc<dyn ToolInvoker> {
        Arc::new(ProcessInvoker::new())
    }

    #[tokio::test]
    async fn succeeds_when_command_exits_zero() {
        let probe = CommandProbe::new(invoker(), Invocation::new("true"));
        wait_until_ready(&probe, quick(), &CancelToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn becomes_ready_when_condition_appears() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ready");
        let probe = CommandProbe::new(
            invoker(),
            Invocation::new("test").args(["-f".to_string(), marker.display().to_string()]),
        );

        let writer = {
            let marker = marker.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                std::fs::write(marker, "ok").unwrap();
            })
        };

        let check = ReadinessCheck::new(Duration::from_millis(50), Duration::from_secs(3));
        wait_until_ready(&probe, check, &CancelToken::new())
            .await
            .unwrap();
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn failing_command_times_out() {
        let probe = CommandProbe::new(invoker(), Invocation::new("false"));
        let err = wait_until_ready(&probe, quick(), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReadinessError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_running_probe() {
        let probe = CommandProbe::new(invoker(), Invocation::new("sleep").arg("10"));
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let check = ReadinessCheck::new(Duration::from_millis(50), Duration::from_secs(30));
        let err = wait_until_ready(&probe, check, &cancel).await.unwrap_err();

        assert!(matches!(err, ReadinessError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
