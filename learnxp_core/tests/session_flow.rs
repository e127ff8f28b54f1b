use std::collections::BTreeMap;

use learnxp_core::{
    AnswerEvaluator, ConceptMatcher, CoreError, LearnConfig, ProgressStore, ProgressTracker,
    QuestionBank, SessionController, SessionPhase, SubjectProgress, TranscriptionFailure,
    TranscriptionOutcome,
};

fn concepts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn config_in(dir: &tempfile::TempDir) -> LearnConfig {
    LearnConfig {
        progress_path: dir.path().join("data").join("user_progress.json"),
        log_file: None,
        ..LearnConfig::default()
    }
}

#[test]
fn unknown_subjects_get_a_generic_question() {
    let mut bank = QuestionBank::builtin();
    for subject in ["Astronomy", "Music Theory", "Cooking"] {
        let q = bank.get_question(subject, 1);
        assert!(!q.prompt.is_empty());
        assert!(q.prompt.contains(subject));
        assert_eq!(q.concepts, vec![subject.to_string()]);
    }
}

#[test]
fn documented_evaluation_scenarios() {
    let evaluator = AnswerEvaluator::default();

    let math = evaluator.evaluate(
        "I think it's 12",
        "Mathematics",
        &concepts(&["addition", "basic math"]),
    );
    assert!(math.is_correct);

    // Accepted by the photosynthesis keyword rule; overlap alone is 2/3.
    let science = evaluator.evaluate(
        "plants make energy from biology",
        "Science",
        &concepts(&["photosynthesis", "plants", "biology"]),
    );
    assert!(science.is_correct);
}

#[test]
fn match_ratio_edge_cases() {
    let matcher = ConceptMatcher::english();
    let empty = matcher.match_ratio("whatever", &[]);
    assert!(empty.matched.is_empty());
    assert_eq!(empty.ratio, 0.0);

    let cat = matcher.match_ratio("The Cat sat", &concepts(&["cat"]));
    assert_eq!(cat.matched, concepts(&["cat"]));
}

#[test]
fn progress_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("user_progress.json");

    let mut tracker = ProgressTracker::open(&path);
    tracker.get_or_init("Science");
    tracker.apply_correct_answer("Mathematics", 1);
    tracker.apply_correct_answer("Mathematics", 1);
    tracker.apply_correct_answer("History", 3);
    assert!(tracker.persist());

    let reloaded = ProgressStore::load(&path);
    assert_eq!(reloaded.entries(), tracker.store().entries());

    let expected: BTreeMap<String, SubjectProgress> = [
        ("History".to_string(), SubjectProgress { level: 3, xp: 30 }),
        ("Mathematics".to_string(), SubjectProgress { level: 1, xp: 20 }),
        ("Science".to_string(), SubjectProgress { level: 1, xp: 0 }),
    ]
    .into_iter()
    .collect();
    assert_eq!(reloaded.entries(), &expected);
}

#[test]
fn full_session_persists_progress_between_controllers() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let mut controller = SessionController::from_config(&config);
    controller.start_session("History").unwrap();
    let feedback = controller
        .submit_answer("George Washington was the first president of the united states")
        .unwrap();
    assert!(feedback.is_correct, "{}", feedback.body);
    assert_eq!(controller.phase(), SessionPhase::Evaluated);

    controller.continue_session().unwrap();
    assert_eq!(controller.phase(), SessionPhase::AwaitingAnswer);
    let summary = controller.end_session().unwrap();
    assert_eq!(summary.subject, "History");
    assert_eq!(summary.questions_answered, 1);
    assert_eq!(summary.correct_answers, 1);
    assert!(summary.ended_at >= summary.started_at);

    let mut next = SessionController::from_config(&config);
    next.start_session("History").unwrap();
    let view = next.view();
    assert_eq!(view.level, 1);
    assert_eq!(view.xp, 10);
    assert_eq!(view.subject.as_deref(), Some("History"));
}

#[test]
fn blank_submission_keeps_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = SessionController::from_config(&config_in(&dir));
    controller.start_session("Science").unwrap();

    assert!(matches!(controller.submit_answer(""), Err(CoreError::EmptyAnswer)));
    assert!(matches!(controller.submit_answer("   "), Err(CoreError::EmptyAnswer)));
    assert_eq!(controller.phase(), SessionPhase::AwaitingAnswer);
    assert_eq!(controller.view().xp, 0);
    assert_eq!(controller.tally().questions_answered, 0);
}

#[test]
fn failed_transcription_text_is_evaluated_as_an_answer() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = SessionController::from_config(&config_in(&dir));
    controller.start_session("Programming").unwrap();

    let handle = controller
        .listen_with(|| -> TranscriptionOutcome { Err(TranscriptionFailure::NoSpeechDetected) })
        .unwrap();
    handle.join().unwrap();

    let draft = controller.poll_transcription().unwrap();
    assert_eq!(draft, "No speech detected");
    let feedback = controller.submit_answer(&draft).unwrap();
    assert!(!feedback.is_correct);
}

#[test]
fn ending_a_session_discards_pending_capture() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = SessionController::from_config(&config_in(&dir));
    controller.start_session("Mathematics").unwrap();
    let sink = controller.begin_capture().unwrap();
    controller.end_session();
    assert!(!sink.complete(Ok("12".to_string())));
    assert!(controller.poll_transcription().is_none());
    assert_eq!(controller.phase(), SessionPhase::Idle);
}

#[test]
fn imported_question_bank_drives_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let questions = dir.path().join("questions.csv");
    std::fs::write(
        &questions,
        "Subject,Level,Prompt,Concepts\n\
         Geography,1,What is the capital of France?,paris;capital\n",
    )
    .unwrap();
    let config = LearnConfig {
        question_bank_path: Some(questions),
        ..config_in(&dir)
    };

    let mut controller = SessionController::from_config(&config);
    assert_eq!(controller.subjects(), vec!["Geography".to_string()]);
    let q = controller.start_session("Geography").unwrap();
    assert_eq!(q.prompt, "What is the capital of France?");
    let feedback = controller.submit_answer("Paris is the capital").unwrap();
    assert!(feedback.is_correct);
    assert_eq!(feedback.body, "Great answer! You covered 2 out of 2 key concepts.");
}
