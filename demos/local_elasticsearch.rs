use local_elasticsearch::{config::LocalElasticsearchProperties, startup};
extern crate pretty_env_logger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    pretty_env_logger::init();

    // LOCAL_ELASTICSEARCH_* variables override the defaults
    let properties = LocalElasticsearchProperties::from_env()?;
    let startup = startup::initialize(&properties).await?;

    let config = startup.client_config();
    let client = config.reqwest_client_builder()?.build()?;
    let info = client
        .get(config.base_url())
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    println!(
        "connected to cluster {} running Elasticsearch {}",
        info["cluster_name"], info["version"]["number"]
    );

    Ok(())
}
