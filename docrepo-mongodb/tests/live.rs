//! Repository scenario against a running MongoDB.
//!
//! Ignored by default. Run with `cargo test -p docrepo-mongodb -- --ignored`, pointing
//! `MONGODB_URI` at a disposable server.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use docrepo_core::{
    backend::StoreBuilder,
    error::ErrorKind,
    filter::Filter,
    index::IndexOption,
    repository::Repository,
};
use docrepo_mongodb::{MongoConfig, MongoDbCollection, MongoDbStore, MongoDbStoreBuilder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Account {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    email: String,
    plan: String,
    bio: String,
}

fn account(email: &str, plan: &str, bio: &str) -> Account {
    Account {
        id: None,
        email: email.to_string(),
        plan: plan.to_string(),
        bio: bio.to_string(),
    }
}

async fn repository(collection: &str) -> (MongoDbStore, Repository<Account, MongoDbCollection>) {
    let config = MongoConfig::from_env();
    let store = MongoDbStoreBuilder::from_config(config).build().await.unwrap();
    let repo = Repository::new(&store, &format!("{collection}_{}", ObjectId::new().to_hex()));

    (store, repo)
}

async fn drop_collection(repo: &Repository<Account, MongoDbCollection>) {
    repo.collection().inner().drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a MongoDB server"]
async fn test_crud_round_trip() {
    let (store, repo) = repository("accounts").await;
    repo.create_index("email", [IndexOption::Unique(true)]).await.unwrap();

    let id = repo.create(&account("a@x.io", "free", "first")).await.unwrap();
    repo.create(&account("b@x.io", "free", "second")).await.unwrap();

    let err = repo.create(&account("a@x.io", "pro", "again")).await.unwrap_err();
    assert!(err.is(ErrorKind::CreateFailed));
    assert!(err.is_duplicate());

    let mut found = repo.find_by_id(&id).await.unwrap();
    assert_eq!(found.email, "a@x.io");

    found.plan = "pro".to_string();
    assert_eq!(repo.update(&id, &found).await.unwrap(), 1);
    assert_eq!(repo.update(&id, &found).await.unwrap(), 0);

    let upgraded = repo
        .update_many([("plan", "team")], &[Filter::eq("plan", "free")])
        .await
        .unwrap();
    assert_eq!(upgraded, 1);
    assert_eq!(repo.count(&[Filter::eq("plan", "team")]).await.unwrap(), 1);

    assert_eq!(repo.delete(&id).await.unwrap(), 1);
    assert!(repo.find_by_id(&id).await.unwrap_err().is_not_found());
    assert!(repo.delete(&id).await.unwrap_err().is_not_found());
    assert!(!repo.exists(&[Filter::eq("email", "a@x.io")]).await.unwrap());

    drop_collection(&repo).await;
    store.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a MongoDB server"]
async fn test_full_text_search_ranks_by_score() {
    let (store, repo) = repository("search").await;
    repo.create_full_text_index([("email", 1), ("bio", 5)], None).await.unwrap();

    repo.create(&account("dev@x.io", "free", "rust developer")).await.unwrap();
    repo.create(&account("rust@x.io", "free", "rust rust rust")).await.unwrap();
    repo.create(&account("ops@x.io", "free", "operations")).await.unwrap();

    let hits = repo.search(0, 0, "rust").await.unwrap();
    let emails = hits.iter().map(|hit| hit.email.as_str()).collect::<Vec<_>>();
    assert_eq!(emails, vec!["rust@x.io", "dev@x.io"]);

    assert!(repo.search(0, 0, "kubernetes").await.unwrap_err().is_not_found());

    drop_collection(&repo).await;
    store.shutdown().await.unwrap();
}
