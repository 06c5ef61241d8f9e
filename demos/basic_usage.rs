use gitdb::{into_document, Client, ClientConfig, Error, Query};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gitdb=debug")),
        )
        .init();

    let client = Client::new(ClientConfig::from_env()?)?;
    client.health().await?;
    println!("server is healthy");

    let collection = "users";
    client.create_collection(collection).await?;
    println!("collections: {:?}", client.list_collections().await?);

    let john = into_document(json!({
        "name": "John Doe",
        "email": "john@example.com",
        "age": 30,
        "active": true,
        "tags": ["developer", "rust"],
        "address": {"city": "New York", "country": "USA"}
    }))?;
    let jane = into_document(json!({
        "name": "Jane Smith",
        "email": "jane@example.com",
        "age": 25,
        "active": true,
        "tags": ["designer", "ui"],
        "address": {"city": "San Francisco", "country": "USA"}
    }))?;

    let john_id = client.insert(collection, &john).await?;
    let jane_id = client.insert(collection, &jane).await?;
    println!("inserted {john_id} and {jane_id}");

    println!("by id: {:?}", client.find_by_id(collection, &john_id).await?);

    let everyone = client.find(collection, &Query::new()).await?;
    println!("all users: {}", everyone.len());

    let over_25 = into_document(json!({"age": {"$gt": 25}}))?;
    println!("older than 25: {:?}", client.find(collection, &over_25).await?);

    let in_ny = into_document(json!({"address.city": "New York"}))?;
    match client.find_one(collection, &in_ny).await {
        Ok(user) => println!("first new yorker: {user:?}"),
        Err(Error::NotFound { .. }) => println!("nobody lives in new york"),
        Err(err) => return Err(err.into()),
    }

    let birthday = into_document(json!({"$inc": {"age": 1}}))?;
    client.update(collection, &john_id, &birthday).await?;

    let active = into_document(json!({"active": true}))?;
    let promote = into_document(json!({"$set": {"tier": "gold"}}))?;
    let modified = client.update_many(collection, &active, &promote).await?;
    println!("promoted {modified} users");

    println!("active users: {}", client.count(collection, &active).await?);

    match client.graphql("query { users { name email } }", None).await {
        Ok(response) => println!("graphql data: {}", response.data.unwrap_or_default()),
        Err(err) => println!("graphql failed: {:?}", err.messages()),
    }

    client.delete(collection, &jane_id).await?;
    let inactive = into_document(json!({"active": false}))?;
    let deleted = client.delete_many(collection, &inactive).await?;
    println!("removed {deleted} inactive users");

    client.delete_collection(collection).await?;
    println!("dropped {collection}");

    Ok(())
}
