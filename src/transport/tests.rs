//! Transport Module Tests
//!
//! ## Test Scopes
//! - **LocalNetwork**: in-process delivery, including real `DataNode` loops serving put and get.
//! - **HttpPostman**: client slots, timeouts and envelope acceptance, without opening sockets.
//! - **Client handlers**: status codes and bodies for answered, missing and timed-out requests.
//! - **Wire format**: the JSON envelope carried between nodes.

#[cfg(test)]
mod tests {
    use crate::config::NodeConfig;
    use crate::node::DataNode;
    use crate::node::protocol::{
        Command, GetAnswer, GetRequest, Handle, NodesUpdate, PutAnswer, PutRequest,
    };
    use crate::storage::Value;
    use crate::transport::Postman;
    use crate::transport::handlers::{handle_get, handle_put};
    use crate::transport::http::HttpPostman;
    use crate::transport::local::LocalNetwork;
    use crate::transport::protocol::{ClientPutRequest, Envelope};

    use axum::Json;
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config(replicas: usize) -> NodeConfig {
        NodeConfig::new(replicas)
            .with_message_rate(100)
            .with_refill_interval(Duration::from_millis(10))
    }

    fn spawn_local_cluster(
        network: &Arc<LocalNetwork>,
        size: usize,
        replicas: usize,
    ) -> Vec<Handle> {
        let handles: Vec<Handle> = (0..size)
            .map(|i| Handle::node(format!("127.0.0.1:{}", 9100 + i)))
            .collect();

        for (i, handle) in handles.iter().enumerate() {
            let inbox = network.register(handle.clone());
            let postman: Arc<dyn Postman> = network.clone();
            DataNode::new(handle.clone(), fast_config(replicas), postman)
                .with_seed(i as u64)
                .spawn(inbox);
        }

        for handle in &handles {
            network.deliver(
                handle,
                Command::NodesUpdate(NodesUpdate {
                    nodes: handles.clone(),
                }),
            );
        }
        handles
    }

    /// Stand-in node: answers each inbox command on the handle `answer` picks.
    fn answer_with<F>(postman: Arc<HttpPostman>, mut inbox: UnboundedReceiver<Command>, answer: F)
    where
        F: Fn(Command) -> Option<(Handle, Command)> + Send + 'static,
    {
        tokio::spawn(async move {
            while let Some(command) = inbox.recv().await {
                if let Some((reply_to, reply)) = answer(command) {
                    postman.deliver(&reply_to, reply);
                }
            }
        });
    }

    fn get_answer(key: &str, value: Option<&str>) -> GetAnswer {
        GetAnswer {
            key: key.to_string(),
            value: value.map(str::to_string),
            found: value.is_some(),
            ticket: 0,
        }
    }

    #[test]
    fn test_local_network_drops_unknown_destinations() {
        let network = LocalNetwork::new();
        let known = Handle::node("127.0.0.1:9001");
        let mut inbox = network.register(known.clone());

        network.deliver(&Handle::node("127.0.0.1:9999"), Command::Timeout);
        network.deliver(&known, Command::Timeout);

        assert_eq!(inbox.try_recv().ok(), Some(Command::Timeout));
        assert!(inbox.try_recv().is_err());

        network.unregister(&known);
        assert!(!network.is_registered(&known));
        network.deliver(&known, Command::Timeout);
    }

    #[tokio::test]
    async fn test_local_cluster_put_then_get_from_another_node() {
        let network = LocalNetwork::new();
        let nodes = spawn_local_cluster(&network, 4, 2);

        let client = Handle::client("127.0.0.1:9000", 1);
        let mut replies = network.register(client.clone());

        network.deliver(
            &nodes[0],
            Command::PutRequest(PutRequest {
                key: "x".to_string(),
                value: Value::unversioned("1"),
                reply_to: client.clone(),
            }),
        );
        let answer = timeout(WAIT, replies.recv()).await.unwrap().unwrap();
        assert!(matches!(answer, Command::PutAnswer(PutAnswer { success: true, .. })));

        network.deliver(
            &nodes[3],
            Command::GetRequest(GetRequest {
                key: "x".to_string(),
                reply_to: client.clone(),
            }),
        );
        let answer = timeout(WAIT, replies.recv()).await.unwrap().unwrap();
        match answer {
            Command::GetAnswer(GetAnswer {
                key, value, found, ..
            }) => {
                assert_eq!(key, "x");
                assert_eq!(value.as_deref(), Some("1"));
                assert!(found);
            }
            other => panic!("expected a get answer, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_local_cluster_answers_missing_keys() {
        let network = LocalNetwork::new();
        let nodes = spawn_local_cluster(&network, 3, 1);

        let client = Handle::client("127.0.0.1:9000", 7);
        let mut replies = network.register(client.clone());

        network.deliver(
            &nodes[1],
            Command::GetRequest(GetRequest {
                key: "never-written".to_string(),
                reply_to: client,
            }),
        );
        let answer = timeout(WAIT, replies.recv()).await.unwrap().unwrap();
        assert!(matches!(
            answer,
            Command::GetAnswer(GetAnswer {
                found: false,
                value: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_http_postman_routes_client_slots_locally() {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let postman = HttpPostman::new("127.0.0.1:9200", inbox_tx, WAIT).unwrap();

        answer_with(postman.clone(), inbox_rx, |command| match command {
            Command::PutRequest(request) => Some((
                request.reply_to,
                Command::PutAnswer(PutAnswer {
                    success: true,
                    ticket: 0,
                }),
            )),
            _ => None,
        });

        let answer = postman
            .ask(|reply_to| {
                Command::PutRequest(PutRequest {
                    key: "k".to_string(),
                    value: Value::unversioned("v"),
                    reply_to,
                })
            })
            .await
            .unwrap();

        assert!(matches!(answer, Command::PutAnswer(PutAnswer { success: true, .. })));
        assert_eq!(postman.waiting_clients(), 0);
    }

    #[tokio::test]
    async fn test_http_postman_times_out_and_frees_the_slot() {
        let (inbox_tx, _inbox_rx) = mpsc::unbounded_channel();
        let postman =
            HttpPostman::new("127.0.0.1:9201", inbox_tx, Duration::from_millis(50)).unwrap();

        let result = postman
            .ask(|reply_to| {
                Command::GetRequest(GetRequest {
                    key: "k".to_string(),
                    reply_to,
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(postman.waiting_clients(), 0);
    }

    #[tokio::test]
    async fn test_http_postman_accepts_envelopes_for_its_own_inbox_only() {
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel();
        let postman = HttpPostman::new("127.0.0.1:9202", inbox_tx, WAIT).unwrap();

        postman.accept(Envelope {
            to: Handle::node("127.0.0.1:9202"),
            command: Command::Timeout,
        });
        postman.accept(Envelope {
            to: Handle::node("127.0.0.1:9999"),
            command: Command::Timeout,
        });

        assert_eq!(inbox_rx.try_recv().ok(), Some(Command::Timeout));
        assert!(inbox_rx.try_recv().is_err());
    }

    #[test]
    fn test_envelope_json_keeps_versions_and_mailboxes() {
        let envelope = Envelope {
            to: Handle::client("10.0.0.1:8080", 42),
            command: Command::PutRequest(PutRequest {
                key: "k".to_string(),
                value: Value::versioned("v", 3),
                reply_to: Handle::node("10.0.0.2:8080"),
            }),
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.to, envelope.to);
        assert_eq!(decoded.command, envelope.command);
    }

    #[tokio::test]
    async fn test_get_handler_answers_504_when_the_node_is_silent() {
        let (inbox_tx, _inbox_rx) = mpsc::unbounded_channel();
        let postman =
            HttpPostman::new("127.0.0.1:9210", inbox_tx, Duration::from_millis(30)).unwrap();

        let (status, Json(body)) =
            handle_get(Extension(postman.clone()), Path("k".to_string())).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body.key, "k");
        assert_eq!(body.value, None);
        assert!(!body.found);
        assert_eq!(postman.waiting_clients(), 0);
    }

    #[tokio::test]
    async fn test_put_handler_answers_504_when_the_node_is_silent() {
        let (inbox_tx, _inbox_rx) = mpsc::unbounded_channel();
        let postman =
            HttpPostman::new("127.0.0.1:9211", inbox_tx, Duration::from_millis(30)).unwrap();

        let request = ClientPutRequest {
            key: "k".to_string(),
            value: "v".to_string(),
        };
        let (status, Json(body)) = handle_put(Extension(postman), Json(request)).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_get_handler_answers_404_for_missing_keys() {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let postman = HttpPostman::new("127.0.0.1:9212", inbox_tx, WAIT).unwrap();
        answer_with(postman.clone(), inbox_rx, |command| match command {
            Command::GetRequest(request) => Some((
                request.reply_to,
                Command::GetAnswer(get_answer(&request.key, None)),
            )),
            _ => None,
        });

        let (status, Json(body)) = handle_get(Extension(postman), Path("gone".to_string())).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.key, "gone");
        assert_eq!(body.value, None);
        assert!(!body.found);
    }

    #[tokio::test]
    async fn test_get_handler_answers_200_with_the_value() {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let postman = HttpPostman::new("127.0.0.1:9213", inbox_tx, WAIT).unwrap();
        answer_with(postman.clone(), inbox_rx, |command| match command {
            Command::GetRequest(request) => Some((
                request.reply_to,
                Command::GetAnswer(get_answer(&request.key, Some("stored"))),
            )),
            _ => None,
        });

        let (status, Json(body)) = handle_get(Extension(postman), Path("k".to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.key, "k");
        assert_eq!(body.value.as_deref(), Some("stored"));
        assert!(body.found);
    }

    #[tokio::test]
    async fn test_put_handler_answers_200_once_acknowledged() {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let postman = HttpPostman::new("127.0.0.1:9214", inbox_tx, WAIT).unwrap();
        answer_with(postman.clone(), inbox_rx, |command| match command {
            Command::PutRequest(request) => {
                assert_eq!(request.value, Value::unversioned("v"));
                Some((
                    request.reply_to,
                    Command::PutAnswer(PutAnswer {
                        success: true,
                        ticket: 0,
                    }),
                ))
            }
            _ => None,
        });

        let request = ClientPutRequest {
            key: "k".to_string(),
            value: "v".to_string(),
        };
        let (status, Json(body)) = handle_put(Extension(postman), Json(request)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
    }
}
