use cardgraph_core::model::{CardStatus, Difficulty, NewFlashcard};
use cardgraph_sdk::{DeckFilter, PracticeFilter, PracticeSession, SdkError, StudyDeck};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use storage::Repository;
use tempfile::tempdir;

async fn repo_with_cards(dir: &std::path::Path) -> Arc<Repository> {
    let repo = Arc::new(Repository::open(dir.join("cards.wal")).await.unwrap());
    for (question, category, difficulty) in [
        ("What is normalization?", "Databases", Difficulty::Basic),
        ("What is a covering index?", "Databases", Difficulty::Advanced),
        ("What is write-ahead logging?", "Databases", Difficulty::Intermediate),
        ("What is a Dockerfile?", "Docker", Difficulty::Basic),
    ] {
        repo.add_flashcard(NewFlashcard::new(
            question,
            "An answer that is long enough to store.",
            category,
            difficulty,
        ))
        .await
        .unwrap();
    }
    repo
}

#[tokio::test]
async fn test_practice_marks_cards_until_pool_is_empty() {
    let dir = tempdir().unwrap();
    let repo = repo_with_cards(dir.path()).await;
    let mut session = PracticeSession::new(
        repo.clone(),
        PracticeFilter::unknown("Databases"),
        StdRng::seed_from_u64(7),
    );

    let first = session.next_card().await.cloned().unwrap();
    assert_eq!(first.category, "Databases");

    let mut answered = 1;
    while session.answer(true).await.unwrap().is_some() {
        answered += 1;
        assert!(answered <= 3);
    }
    assert_eq!(answered, 3);
    assert!(session.current().is_none());

    let known = repo.flashcards_by_filters("Databases", CardStatus::Known, None).await;
    assert_eq!(known.len(), 3);
    let docker = repo.flashcards_by_category("Docker", Some(CardStatus::Unknown)).await;
    assert_eq!(docker.len(), 1);
}

#[tokio::test]
async fn test_practice_respects_difficulty_and_unknown_answers() {
    let dir = tempdir().unwrap();
    let repo = repo_with_cards(dir.path()).await;
    let mut session = PracticeSession::new(
        repo.clone(),
        PracticeFilter::unknown("Databases").with_difficulty(Difficulty::Advanced),
        StdRng::seed_from_u64(42),
    );

    let card = session.next_card().await.cloned().unwrap();
    assert_eq!(card.question, "What is a covering index?");

    // Still unknown, so the same card comes back.
    let again = session.answer(false).await.unwrap().cloned().unwrap();
    assert_eq!(again.id, card.id);
    assert_eq!(repo.get_flashcard(card.id).await.unwrap().status, CardStatus::Unknown);
}

#[tokio::test]
async fn test_answer_without_card_is_an_error() {
    let dir = tempdir().unwrap();
    let repo = repo_with_cards(dir.path()).await;
    let mut session = PracticeSession::new(
        repo,
        PracticeFilter::unknown("Kubernetes"),
        StdRng::seed_from_u64(1),
    );

    assert!(session.next_card().await.is_none());
    assert!(matches!(session.answer(true).await, Err(SdkError::NoCurrentCard)));
}

#[tokio::test]
async fn test_deck_browse_and_summary() {
    let dir = tempdir().unwrap();
    let repo = repo_with_cards(dir.path()).await;
    let deck = StudyDeck::new(repo);

    assert_eq!(deck.categories().await, vec!["Databases", "Docker"]);

    let databases = deck
        .browse(&DeckFilter {
            category: Some("Databases".to_string()),
            ..DeckFilter::default()
        })
        .await;
    let difficulties: Vec<Difficulty> = databases.iter().map(|c| c.difficulty).collect();
    assert_eq!(
        difficulties,
        vec![Difficulty::Basic, Difficulty::Intermediate, Difficulty::Advanced]
    );

    deck.set_status(databases[0].id, CardStatus::Known).await.unwrap();
    let known = deck
        .browse(&DeckFilter {
            status: Some(CardStatus::Known),
            ..DeckFilter::default()
        })
        .await;
    assert_eq!(known.len(), 1);

    let summary = deck.summary().await;
    let databases_unknown = summary
        .iter()
        .find(|s| s.category == "Databases" && s.status == CardStatus::Unknown)
        .unwrap();
    assert_eq!(databases_unknown.count, 2);

    deck.delete_card(known[0].id).await.unwrap();
    assert_eq!(deck.browse(&DeckFilter::default()).await.len(), 3);
}
