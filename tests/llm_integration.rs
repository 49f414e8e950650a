//! Integration tests for the LLM clients.
//!
//! These tests make real API calls to OpenRouter.
//! Run with: OPENROUTER_API_KEY=your_key cargo test --test llm_integration -- --ignored

use toolbox::llm::{GenerationRequest, LlmProvider, Message, OpenRouterProvider};

const TEST_MODEL: &str = "anthropic/claude-sonnet-4";

fn get_test_api_key() -> String {
    std::env::var("OPENROUTER_API_KEY")
        .expect("OPENROUTER_API_KEY environment variable must be set for integration tests")
}

fn create_test_client() -> OpenRouterProvider {
    OpenRouterProvider::with_model(get_test_api_key(), TEST_MODEL.to_string())
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        TEST_MODEL,
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = client.generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let response = response.expect("Should have response");
    let content = response.first_content().expect("Should have content");
    assert!(
        content.contains('4'),
        "Response should contain '4', got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_tool_call_reply() {
    let client = create_test_client();

    let request = GenerationRequest::new(
        "",
        vec![
            Message::system(
                "To call a tool, reply with a single JSON object: {\"tool\": \"<name>\", \"arguments\": {}}",
            ),
            Message::user("Call the tool named walk with no arguments."),
        ],
    )
    .with_max_tokens(50)
    .with_temperature(0.0);

    let response = client
        .generate(request)
        .await
        .expect("Generation should succeed");
    let content = response.first_content().expect("Should have content");

    assert!(
        content.contains("\"walk\""),
        "Response should call walk, got: {}",
        content
    );
}

#[tokio::test]
#[ignore]
async fn test_invalid_api_key() {
    let client = OpenRouterProvider::new("invalid-key".to_string());

    let request =
        GenerationRequest::new(TEST_MODEL, vec![Message::user("test")]).with_max_tokens(5);

    let response = client.generate(request).await;
    assert!(response.is_err(), "Should fail with invalid API key");
}
