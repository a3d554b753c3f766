//! End-to-end tests: both transports over one gateway

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;
use sdgrpc_domain::{GeneratedImage, GenerationRequest};
use sdgrpc_engine::{ConfiguredEngineManager, EngineSpec, Pipeline};
use sdgrpc_gateway::{build_manager, start, Gateway, GatewayConfig, GatewayError};
use sdgrpc_grpc::proto;
use sdgrpc_grpc::proto::dashboard_service_client::DashboardServiceClient;
use sdgrpc_grpc::proto::engines_service_client::EnginesServiceClient;
use sdgrpc_grpc::proto::generation_service_client::GenerationServiceClient;
use sdgrpc_web::frame;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tonic::transport::Channel;
use tonic::Code;

const ENGINES_YAML: &str = r#"
- id: echo
  name: Echo
  description: Returns the prompt as image bytes
  class: EchoPipeline
  default: true
- id: hidden
  name: Hidden
  class: EchoPipeline
  visible: false
"#;

/// Returns the prompt as the image payload; prompt `"fail"` errors
struct EchoPipeline;

#[async_trait]
impl Pipeline for EchoPipeline {
    async fn run(
        &self,
        _engine: &EngineSpec,
        request: &GenerationRequest,
    ) -> anyhow::Result<Vec<GeneratedImage>> {
        let prompt = request.positive_prompt();
        if prompt == "fail" {
            anyhow::bail!("pipeline refused the prompt");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(request
            .params
            .seeds
            .iter()
            .map(|&seed| GeneratedImage::png(seed, prompt.clone().into_bytes()))
            .collect())
    }
}

fn test_config() -> GatewayConfig {
    GatewayConfig {
        native_port: 0,
        web_port: 0,
        ..GatewayConfig::default()
    }
}

struct Running {
    native: SocketAddr,
    web: SocketAddr,
}

async fn spawn_gateway() -> Running {
    let manager = ConfiguredEngineManager::from_yaml_str(ENGINES_YAML)
        .unwrap()
        .with_pipeline("EchoPipeline", Arc::new(EchoPipeline));

    let gateway = Gateway::bind(&test_config(), Arc::new(manager))
        .await
        .unwrap();
    let running = Running {
        native: gateway.native_addr().unwrap(),
        web: gateway.web_addr().unwrap(),
    };
    tokio::spawn(gateway.run());
    running
}

async fn channel(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

/// Decoded gRPC-Web reply
struct WebReply {
    allow_origins: usize,
    messages: Vec<Vec<u8>>,
    status: Code,
}

impl WebReply {
    fn single<M: Message + Default>(&self) -> M {
        assert_eq!(self.messages.len(), 1);
        M::decode(self.messages[0].as_slice()).unwrap()
    }
}

async fn web_call(addr: SocketAddr, path: &str, message: &impl Message) -> WebReply {
    // reqwest sends `accept: */*`, which the gateway must correct
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .header("content-type", "application/grpc-web+proto")
        .header("x-grpc-web", "1")
        .body(frame::encode_message(&message.encode_to_vec()).unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers().clone();
    assert_eq!(
        headers.get("content-type").unwrap(),
        "application/grpc-web+proto"
    );
    let body: Bytes = response.bytes().await.unwrap();

    let mut messages = Vec::new();
    let mut status = headers.get("grpc-status").cloned();
    for parsed in frame::parse_frames(&body).unwrap() {
        if parsed.is_trailer() {
            status = frame::decode_trailers(parsed.payload)
                .get("grpc-status")
                .cloned();
        } else {
            messages.push(parsed.payload.to_vec());
        }
    }

    let code: i32 = status.unwrap().to_str().unwrap().parse().unwrap();
    WebReply {
        allow_origins: headers.get_all("access-control-allow-origin").iter().count(),
        messages,
        status: Code::from_i32(code),
    }
}

fn generate_request(prompt: &str, seeds: Vec<u32>) -> proto::Request {
    proto::Request {
        request_id: format!("req-{prompt}"),
        prompt: vec![proto::Prompt {
            parameters: None,
            prompt: Some(proto::prompt::Prompt::Text(prompt.to_string())),
        }],
        params: Some(proto::request::Params::Image(proto::ImageParameters {
            samples: Some(seeds.len() as u64),
            seed: seeds,
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// Drop the per-call fields (ids and timestamps)
fn comparable(mut answer: proto::Answer) -> proto::Answer {
    answer.answer_id.clear();
    answer.received = 0;
    answer.created = 0;
    answer
}

async fn native_generate(
    addr: SocketAddr,
    request: proto::Request,
) -> Result<Vec<proto::Answer>, tonic::Status> {
    let mut client = GenerationServiceClient::new(channel(addr).await);
    let mut stream = client.generate(request).await?.into_inner();
    let mut answers = Vec::new();
    while let Some(answer) = stream.message().await? {
        answers.push(answer);
    }
    Ok(answers)
}

#[tokio::test]
async fn test_list_engines_equivalent() {
    let gateway = spawn_gateway().await;

    let native = EnginesServiceClient::new(channel(gateway.native).await)
        .list_engines(proto::ListEnginesRequest {})
        .await
        .unwrap()
        .into_inner();

    let web = web_call(
        gateway.web,
        "/gooseai.EnginesService/ListEngines",
        &proto::ListEnginesRequest {},
    )
    .await;
    assert_eq!(web.status, Code::Ok);
    assert_eq!(web.allow_origins, 1);

    let web: proto::Engines = web.single();
    assert_eq!(native, web);
    assert_eq!(web.engine.len(), 1);
    assert_eq!(web.engine[0].id, "echo");
    assert!(web.engine[0].ready);
}

#[tokio::test]
async fn test_dashboard_equivalent() {
    let gateway = spawn_gateway().await;
    let mut client = DashboardServiceClient::new(channel(gateway.native).await);

    let native_me = client
        .get_me(proto::EmptyRequest {})
        .await
        .unwrap()
        .into_inner();
    let web_me: proto::User = web_call(
        gateway.web,
        "/gooseai.DashboardService/GetMe",
        &proto::EmptyRequest {},
    )
    .await
    .single();
    assert_eq!(native_me, web_me);

    let lookup = proto::GetOrganizationRequest {
        id: "local-org".to_string(),
    };
    let native_org = client
        .get_organization(lookup.clone())
        .await
        .unwrap()
        .into_inner();
    let web_org: proto::Organization = web_call(
        gateway.web,
        "/gooseai.DashboardService/GetOrganization",
        &lookup,
    )
    .await
    .single();
    assert_eq!(native_org, web_org);

    let missing = proto::GetOrganizationRequest {
        id: "elsewhere".to_string(),
    };
    let native_err = client.get_organization(missing.clone()).await.unwrap_err();
    let web_err = web_call(
        gateway.web,
        "/gooseai.DashboardService/GetOrganization",
        &missing,
    )
    .await;
    assert_eq!(native_err.code(), Code::NotFound);
    assert_eq!(web_err.status, Code::NotFound);
}

#[tokio::test]
async fn test_generate_equivalent() {
    let gateway = spawn_gateway().await;
    let request = generate_request("a red kite", vec![3, 5]);

    let native: Vec<_> = native_generate(gateway.native, request.clone())
        .await
        .unwrap()
        .into_iter()
        .map(comparable)
        .collect();

    let web = web_call(gateway.web, "/gooseai.GenerationService/Generate", &request).await;
    assert_eq!(web.status, Code::Ok);
    let web: Vec<_> = web
        .messages
        .iter()
        .map(|m| comparable(proto::Answer::decode(m.as_slice()).unwrap()))
        .collect();

    assert_eq!(native.len(), 2);
    assert_eq!(native, web);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_not_mixed_up() {
    let gateway = spawn_gateway().await;

    let mut calls = Vec::new();
    for i in 0..6u32 {
        let native = gateway.native;
        let web = gateway.web;
        calls.push(tokio::spawn(async move {
            let prompt = format!("native prompt {i}");
            let answers = native_generate(native, generate_request(&prompt, vec![i]))
                .await
                .unwrap();
            (prompt, i, answers)
        }));
        calls.push(tokio::spawn(async move {
            let prompt = format!("web prompt {i}");
            let reply = web_call(
                web,
                "/gooseai.GenerationService/Generate",
                &generate_request(&prompt, vec![100 + i]),
            )
            .await;
            assert_eq!(reply.status, Code::Ok);
            let answers: Vec<proto::Answer> = reply
                .messages
                .iter()
                .map(|m| proto::Answer::decode(m.as_slice()).unwrap())
                .collect();
            (prompt, 100 + i, answers)
        }));
    }

    for call in calls {
        let (prompt, seed, answers) = call.await.unwrap();
        assert_eq!(answers.len(), 1);
        let artifact = &answers[0].artifacts[0];
        assert_eq!(artifact.seed, seed);
        assert_eq!(
            artifact.data,
            Some(proto::artifact::Data::Binary(prompt.as_bytes().to_vec()))
        );
        assert_eq!(answers[0].request_id, format!("req-{prompt}"));
    }
}

#[tokio::test]
async fn test_failing_call_does_not_affect_the_next() {
    let gateway = spawn_gateway().await;

    let err = native_generate(gateway.native, generate_request("fail", vec![1]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    let ok = native_generate(gateway.native, generate_request("fine", vec![1]))
        .await
        .unwrap();
    assert_eq!(ok.len(), 1);

    let failed = web_call(
        gateway.web,
        "/gooseai.GenerationService/Generate",
        &generate_request("fail", vec![1]),
    )
    .await;
    assert_eq!(failed.status, Code::Internal);
    assert!(failed.messages.is_empty());

    let fine = web_call(
        gateway.web,
        "/gooseai.GenerationService/Generate",
        &generate_request("fine", vec![1]),
    )
    .await;
    assert_eq!(fine.status, Code::Ok);
    assert_eq!(fine.messages.len(), 1);
}

#[tokio::test]
async fn test_hidden_engine_still_addressable() {
    let gateway = spawn_gateway().await;
    let mut request = generate_request("quiet", vec![9]);
    request.engine_id = "hidden".to_string();

    let answers = native_generate(gateway.native, request).await.unwrap();
    assert_eq!(
        answers[0].meta.as_ref().unwrap().engine_id.as_deref(),
        Some("hidden")
    );

    let mut request = generate_request("loud", vec![9]);
    request.engine_id = "missing".to_string();
    let err = native_generate(gateway.native, request).await.unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

/// A port that is free right now
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_manager_failure_is_fatal_and_leaves_no_listener() {
    let native_port = free_port().await;
    let web_port = free_port().await;
    let config = GatewayConfig {
        engine_config: PathBuf::from("/nonexistent/engines.yaml"),
        native_port,
        web_port,
        ..GatewayConfig::default()
    };

    let result = start(config).await;
    assert!(matches!(result, Err(GatewayError::Manager(_))));

    TcpListener::bind(("127.0.0.1", native_port)).await.unwrap();
    TcpListener::bind(("127.0.0.1", web_port)).await.unwrap();
}

#[tokio::test]
async fn test_invalid_engines_document_is_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "- id: a\n  class: X\n- id: a\n  class: X").unwrap();

    let config = GatewayConfig {
        engine_config: file.path().to_path_buf(),
        ..test_config()
    };
    let result = build_manager(&config, Vec::new());
    assert!(matches!(result, Err(GatewayError::Manager(_))));
}

#[tokio::test]
async fn test_web_bind_failure_releases_native_port() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let native_port = free_port().await;
    let config = GatewayConfig {
        native_port,
        web_port: occupied.local_addr().unwrap().port(),
        ..GatewayConfig::default()
    };

    let manager = ConfiguredEngineManager::from_yaml_str(ENGINES_YAML).unwrap();
    let result = Gateway::bind(&config, Arc::new(manager)).await;
    assert!(matches!(
        result,
        Err(GatewayError::Bind {
            transport: "gRPC-Web",
            ..
        })
    ));

    TcpListener::bind(("127.0.0.1", native_port)).await.unwrap();
}

#[tokio::test]
async fn test_engines_file_with_pipelines() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{ENGINES_YAML}").unwrap();

    let config = GatewayConfig {
        engine_config: file.path().to_path_buf(),
        ..test_config()
    };
    let manager = build_manager(
        &config,
        vec![("EchoPipeline".to_string(), Arc::new(EchoPipeline) as Arc<dyn Pipeline>)],
    )
    .unwrap();
    assert_eq!(manager.engine_count(), 2);

    let gateway = Gateway::bind(&config, Arc::new(manager)).await.unwrap();
    let web = gateway.web_addr().unwrap();
    tokio::spawn(gateway.run());

    let health: serde_json::Value = reqwest::get(format!("http://{web}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["ready_engines"], 1);
}

#[test]
fn test_shipped_config_files_load() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config");

    let config = GatewayConfig::from_file(root.join("gateway.toml")).unwrap();
    assert_eq!(
        config,
        GatewayConfig {
            engine_config: PathBuf::from("./config/engines.yaml"),
            ..GatewayConfig::default()
        }
    );

    let manager = ConfiguredEngineManager::from_file(root.join("engines.yaml")).unwrap();
    assert_eq!(manager.engine_count(), 3);
}
