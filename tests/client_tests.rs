mod common;

use bitpay_client::core::config::{StaticEnv, ENV_API_HOST, ENV_API_PORT, ENV_USE_TESTNET};
use bitpay_client::core::kernel::{verify_signature, IDENTITY_HEADER, SIGNATURE_HEADER};
use bitpay_client::{ClientError, Facade, Method, PartialConfig};
use common::{builder, keyed_client, keyless_client, MockTransport, PRIVATE_KEY, PUBLIC_KEY};
use serde_json::{json, Value};
use tempfile::TempDir;

fn home_with_config(contents: &str) -> TempDir {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".bitpay");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), contents).unwrap();
    home
}

const FILE_CONFIG: &str = r#"{ "apiHost": "fileApiHost", "apiPort": "7777", "forceSSL": "true" }"#;

mod construction {
    use super::*;

    #[tokio::test]
    async fn test_client_without_key() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        assert!(!client.defaults().get_tokens);
        assert!(!client.defaults().sign_requests);
        assert_eq!(client.facade(), Facade::Public);
        assert!(client.identity().is_none());
        client.ready().await.unwrap();
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_client_with_key() {
        let transport = MockTransport::new();
        let client = builder(&transport).private_key(PRIVATE_KEY).build().unwrap();

        assert!(client.defaults().get_tokens);
        assert!(client.defaults().sign_requests);
        assert_eq!(client.facade(), Facade::Merchant);
        assert_eq!(client.identity().unwrap().public_key, PUBLIC_KEY);

        client.ready().await.unwrap();
        assert!(client.is_ready());

        let bootstrap = transport.last_request();
        assert_eq!(bootstrap.method, Method::GET);
        assert_eq!(bootstrap.url, "https://bitpay.com:443/tokens");
        assert!(bootstrap.is_signed());
    }

    #[tokio::test]
    async fn test_explicit_config_overrides_defaults() {
        let transport = MockTransport::new();
        let client = builder(&transport)
            .private_key(PRIVATE_KEY)
            .config(
                PartialConfig::new()
                    .api_host("myhost")
                    .api_port(8080)
                    .force_ssl(false),
            )
            .build()
            .unwrap();

        assert_eq!(client.config().api_host, "myhost");
        assert_eq!(client.config().api_port, 8080);
        assert!(!client.config().force_ssl);
        client.ready().await.unwrap();
        assert_eq!(transport.last_request().url, "http://myhost:8080/tokens");
    }

    #[tokio::test]
    async fn test_environment_variables_are_used() {
        let transport = MockTransport::new();
        let env = StaticEnv::new()
            .with_var(ENV_API_HOST, "envApiHost")
            .with_var(ENV_API_PORT, "9999");
        let client = builder(&transport).env(env).build().unwrap();

        assert_eq!(client.config().api_host, "envApiHost");
        assert_eq!(client.config().api_port, 9999);
    }

    #[tokio::test]
    async fn test_config_file_is_used_without_env() {
        let home = home_with_config(FILE_CONFIG);
        let transport = MockTransport::new();
        let client = builder(&transport)
            .env(StaticEnv::new().with_home_dir(home.path()))
            .build()
            .unwrap();

        assert_eq!(client.config().api_host, "fileApiHost");
        assert_eq!(client.config().api_port, 7777);
    }

    #[tokio::test]
    async fn test_testnet_env_wins() {
        let home = home_with_config(FILE_CONFIG);
        let transport = MockTransport::new();
        let env = StaticEnv::new()
            .with_home_dir(home.path())
            .with_var(ENV_API_HOST, "envApiHost")
            .with_var(ENV_USE_TESTNET, "true");
        let client = builder(&transport)
            .env(env)
            .config(PartialConfig::new().api_host("myhost"))
            .build()
            .unwrap();

        assert_eq!(client.config().api_host, "test.bitpay.com");
        assert_eq!(client.config().api_port, 443);
        assert!(client.config().force_ssl);
    }

    #[tokio::test]
    async fn test_testnet_builder_switch() {
        let transport = MockTransport::new();
        let client = builder(&transport).testnet(true).build().unwrap();
        assert_eq!(client.config().base_url(), "https://test.bitpay.com:443");
    }

    #[tokio::test]
    async fn test_env_and_file_combine_per_field() {
        let home = home_with_config(FILE_CONFIG);
        let transport = MockTransport::new();
        let env = StaticEnv::new()
            .with_home_dir(home.path())
            .with_var(ENV_API_PORT, "999");
        let client = builder(&transport).env(env).build().unwrap();

        assert_eq!(client.config().api_host, "fileApiHost");
        assert_eq!(client.config().api_port, 999);
    }
}

mod facade {
    use super::*;

    #[tokio::test]
    async fn test_as_changes_the_facade() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;
        assert_eq!(client.as_facade(Facade::Public).facade(), Facade::Public);
    }

    #[tokio::test]
    async fn test_facade_resets_after_request() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;

        client
            .as_facade(Facade::Public)
            .get("rates", None)
            .await
            .unwrap();
        assert_eq!(client.facade(), Facade::Merchant);
        assert!(!transport.last_request().is_signed());

        client.get("rates", None).await.unwrap();
        assert!(transport.last_request().is_signed());
    }

    #[tokio::test]
    async fn test_facade_resets_after_failed_request() {
        let transport = MockTransport::with_body("not json");
        let client = builder(&transport)
            .private_key(PRIVATE_KEY)
            .get_tokens(false)
            .build()
            .unwrap();

        let result = client.as_facade(Facade::Public).get("rates", None).await;
        assert!(matches!(result, Err(ClientError::Parse(_))));
        assert_eq!(client.facade(), Facade::Merchant);
    }

    #[tokio::test]
    async fn test_prepare_does_not_consume_override() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;

        let request = client
            .as_facade(Facade::Public)
            .prepare(Method::GET, "rates", None)
            .unwrap();
        assert!(!request.is_signed());
        assert_eq!(client.facade(), Facade::Public);
    }

    #[tokio::test]
    async fn test_signed_facade_without_key_is_an_error() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        let result = client.as_facade(Facade::User).get("tokens", None).await;
        assert!(matches!(result, Err(ClientError::Signing(_))));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(client.facade(), Facade::Public);
    }
}

mod send_request {
    use super::*;

    #[tokio::test]
    async fn test_request_is_signed_with_key() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;

        client.get("rates", None).await.unwrap();
        let request = transport.last_request();

        assert_eq!(request.header(IDENTITY_HEADER), Some(PUBLIC_KEY));
        let signature = request.header(SIGNATURE_HEADER).unwrap();
        assert!(verify_signature(&request.data_to_sign, signature, PUBLIC_KEY));
    }

    #[tokio::test]
    async fn test_request_without_key_is_unsigned() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        client.get("rates", None).await.unwrap();
        let request = transport.last_request();

        assert!(request.header(IDENTITY_HEADER).is_none());
        assert!(request.header(SIGNATURE_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_verbs_send_matching_methods() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        client.get("rates", None).await.unwrap();
        assert_eq!(transport.last_request().method.as_str(), "GET");

        client.put("rates", None).await.unwrap();
        assert_eq!(transport.last_request().method.as_str(), "PUT");

        client.post("rates", None).await.unwrap();
        assert_eq!(transport.last_request().method.as_str(), "POST");

        client.delete("rates", None).await.unwrap();
        assert_eq!(transport.last_request().method.as_str(), "DELETE");
    }

    #[tokio::test]
    async fn test_no_trailing_delimiter_without_data() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;

        client
            .as_facade(Facade::User)
            .get("tokens", None)
            .await
            .unwrap();
        let request = transport.last_request();

        assert!(request.is_signed());
        assert!(!request.data_to_sign.ends_with('?'));
        assert_eq!(request.data_to_sign, "https://bitpay.com:443/tokens");
    }

    #[tokio::test]
    async fn test_post_body_is_signed_and_carries_guid() {
        let transport = MockTransport::new();
        let client = keyed_client(&transport).await;

        client
            .post("invoices", Some(json!({ "price": 10, "currency": "USD" })))
            .await
            .unwrap();
        let request = transport.last_request();

        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["price"], 10);
        assert_eq!(body["guid"].as_str().unwrap().len(), 36);
        assert_eq!(
            request.data_to_sign,
            format!("{}{}", request.url, request.body.as_deref().unwrap())
        );
    }

    #[tokio::test]
    async fn test_caller_guid_is_kept() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        client
            .post("invoices", Some(json!({ "guid": "mine" })))
            .await
            .unwrap();
        let body: Value =
            serde_json::from_str(transport.last_request().body.as_deref().unwrap()).unwrap();
        assert_eq!(body["guid"], "mine");
    }

    #[tokio::test]
    async fn test_non_object_params_are_rejected() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);

        let result = client.get("rates", Some(json!("USD"))).await;
        assert!(matches!(result, Err(ClientError::InvalidParameters(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_guid() {
        let transport = MockTransport::new();
        let client = keyless_client(&transport);
        assert_eq!(client.create_guid().len(), 36);
    }
}
