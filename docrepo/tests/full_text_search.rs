use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use docrepo::{
    memory::{InMemoryCollection, InMemoryStore},
    prelude::*,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    bio: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

fn profile(name: &str, bio: &str, tags: &[&str]) -> Profile {
    Profile {
        id: Some(ObjectId::new()),
        name: name.to_string(),
        bio: bio.to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

fn names(profiles: &[Profile]) -> Vec<&str> {
    profiles.iter().map(|profile| profile.name.as_str()).collect()
}

async fn indexed() -> Repository<Profile, InMemoryCollection> {
    let store = InMemoryStore::new();
    let repo = Repository::new(&store, "profiles");

    repo.create_full_text_index([("name", 10), ("bio", 5), ("tags", 1)], Some("english"))
        .await
        .unwrap();

    for profile in [
        profile("Test John Doe", "Software Engineer", &["go", "mongodb", "developer", "test"]),
        profile("Jane Smith", "Data Scientist", &["python", "machine learning", "data analysis"]),
        profile("Kayla TestJohnson", "Frontend Developer", &["javascript", "react", "web development"]),
        profile("Alex Brown", "Backend Test Developer", &["golang", "spring", "web development"]),
        profile("Emily Davis", "UI/UX Designer Test", &["design", "user experience", "prototyping"]),
        profile(
            "Michael Wilson",
            "Golang Engineer",
            &["test", "docker", "kubernetes", "cloud", "microservices", "go-test"],
        ),
        profile("Clark Thompson", "Product Manager", &["agile", "scrum", "product development", "testify"]),
        profile("David Lee", "Web Developer", &["javascript", "node.js", "react", "web development"]),
        profile("Jessica Martinez", "Mobile App Developer", &["android", "java", "kotlin"]),
        profile("Ryan Clark", "Data Engineer", &["big data", "hadoop", "test"]),
    ] {
        repo.create(&profile).await.unwrap();
    }

    repo
}

#[tokio::test]
async fn test_search_orders_by_relevance() {
    let repo = indexed().await;

    let hits = repo.search(0, 10, "test").await.unwrap();

    assert_eq!(
        names(&hits),
        vec!["Test John Doe", "Alex Brown", "Emily Davis", "Michael Wilson", "Ryan Clark"]
    );
}

#[tokio::test]
async fn test_search_with_exclusion() {
    let repo = indexed().await;

    let hits = repo.search(0, 10, "web -test").await.unwrap();

    assert_eq!(names(&hits), vec!["David Lee", "Kayla TestJohnson"]);
}

#[tokio::test]
async fn test_search_pages_through_ranked_results() {
    let repo = indexed().await;

    let first = repo.search(0, 2, "test").await.unwrap();
    let second = repo.search(2, 2, "test").await.unwrap();
    let defaulted = repo.search(0, 0, "test").await.unwrap();

    assert_eq!(names(&first), vec!["Test John Doe", "Alex Brown"]);
    assert_eq!(names(&second), vec!["Emily Davis", "Michael Wilson"]);
    assert_eq!(defaulted.len(), 5);
}

#[tokio::test]
async fn test_search_phrase() {
    let repo = indexed().await;

    let hits = repo.search(0, 10, "\"machine learning\"").await.unwrap();

    assert_eq!(names(&hits), vec!["Jane Smith"]);
}

#[tokio::test]
async fn test_search_without_matches_is_not_found() {
    let repo = indexed().await;

    let err = repo.search(0, 10, "haskell").await.unwrap_err();

    assert!(err.is(ErrorKind::FindManyFailed));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_search_requires_text_index() {
    let store = InMemoryStore::new();
    let repo: Repository<Profile, _> = Repository::new(&store, "profiles");
    repo.create(&profile("Ann", "", &[])).await.unwrap();

    let err = repo.search(0, 10, "ann").await.unwrap_err();

    assert!(err.is(ErrorKind::FindManyFailed));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_full_text_index_is_idempotent_but_exclusive() {
    let repo = indexed().await;

    repo.create_full_text_index([("name", 10), ("bio", 5), ("tags", 1)], Some("english"))
        .await
        .unwrap();

    let err = repo
        .create_full_text_index([("bio", 1)], None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::IndexCreationFailed));
}

#[tokio::test]
async fn test_text_search_combines_with_filters() {
    let repo = indexed().await;

    let hits = repo
        .find_many_by_filter(0, 0, &[Filter::text_search("developer"), Filter::is_in("tags", ["react"])])
        .await
        .unwrap();

    assert_eq!(names(&hits), vec!["Kayla TestJohnson", "David Lee"]);
}
