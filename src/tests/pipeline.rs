#[path = "support.rs"]
mod support;

use std::future::pending;
use std::sync::atomic::Ordering;
use support::*;
use veriprog_rs::annotation::{AnnotationTable, Annotator};
use veriprog_rs::batch::{run_stage, StageState};
use veriprog_rs::config::{ArtifactPaths, ScoreWeights};
use veriprog_rs::generation::ProgramGenerator;
use veriprog_rs::load_array;
use veriprog_rs::scoring::aggregate;
use veriprog_rs::types::*;
use veriprog_rs::verification::VerificationExecutor;

async fn generate_and_annotate(paths: &ArtifactPaths, oracle: &FakeOracle) {
    let claims: Vec<ClaimRecord> = load_array(&paths.claims).unwrap();
    run_stage(&ProgramGenerator::new(oracle), &claims, &paths.programs, pending()).await.unwrap();
    run_stage(&Annotator::new(oracle), &claims, &paths.annotations, pending()).await.unwrap();
}

#[tokio::test]
async fn full_pipeline_labels_claims_and_flags_propagators() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    write_claims(&paths.claims, &sample_claims());
    let oracle = sample_oracle();

    generate_and_annotate(&paths, &oracle).await;
    let programs: Vec<ProgramRecord> = load_array(&paths.programs).unwrap();
    assert_eq!(programs.len(), 3);
    assert!(programs[1].predicted_programs[0].starts_with("def program():"));

    let table = AnnotationTable::load(&paths.annotations).unwrap();
    assert_eq!(table.framing(3), (Emotion::Anger, Some(NarrativeTechnique::Fabrication)));

    let summary = run_stage(&VerificationExecutor::new(&oracle, &table), &programs, &paths.verification, pending())
        .await
        .unwrap();
    assert_eq!((summary.written, summary.state), (3, StageState::Completed));

    let records: Vec<VerificationRecord> = load_array(&paths.verification).unwrap();
    assert_eq!(records[0].answers["answer_1"].as_deref(), Some("Paris."));
    assert_eq!(records[0].basic["fact_1"], Verdict::True);
    assert_eq!(records[0].augmented["fact_1with"], Verdict::True);
    assert_eq!(records[2].basic.len(), 2);

    let claims: Vec<ClaimRecord> = load_array(&paths.claims).unwrap();
    let truth = claims.into_iter().map(|c| (c.id, c)).collect();
    let (report, propagators) = aggregate(&records, &truth, &table, ScoreWeights::default());

    let predicted: Vec<u8> = report.per_claim.iter().map(|r| r.predicted).collect();
    assert_eq!(predicted, vec![1, 0, 0]);
    assert!((report.metrics.accuracy - 1.0).abs() < 1e-9);
    assert!((report.metrics.f1 - 1.0).abs() < 1e-9);
    assert_eq!(propagators.len(), 1);
    assert_eq!(propagators[0].id, 3);
    assert_eq!(propagators[0].narrative_techniques, NarrativeTechnique::Fabrication);
}

#[tokio::test]
async fn interrupted_execution_resumes_to_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    write_claims(&paths.claims, &sample_claims());
    let oracle = sample_oracle();
    generate_and_annotate(&paths, &oracle).await;

    let programs: Vec<ProgramRecord> = load_array(&paths.programs).unwrap();
    let table = AnnotationTable::load(&paths.annotations).unwrap();
    let executor = VerificationExecutor::new(&oracle, &table);

    let reference = dir.path().join("reference.json");
    run_stage(&executor, &programs, &reference, pending()).await.unwrap();

    // claim 1 costs three oracle calls; stop once it is done
    let calls = oracle.calls.clone();
    let start = calls.load(Ordering::SeqCst);
    let stop = async move {
        while calls.load(Ordering::SeqCst) < start + 3 {
            tokio::task::yield_now().await;
        }
    };
    let first = run_stage(&executor, &programs, &paths.verification, stop).await.unwrap();
    assert_eq!(first.state, StageState::Interrupted);
    assert_eq!(first.written, 1);
    assert!(load_array::<VerificationRecord>(&paths.verification).is_err(), "array is still open");

    let before = oracle.calls();
    let second = run_stage(&executor, &programs, &paths.verification, pending()).await.unwrap();
    assert_eq!(second.state, StageState::Completed);
    assert_eq!(second.skipped_existing, 1);
    assert_eq!(second.written, 2);
    assert_eq!(oracle.calls() - before, 2 + 4, "claims 2 and 3 only");

    assert_eq!(std::fs::read(&paths.verification).unwrap(), std::fs::read(&reference).unwrap());
}

#[tokio::test]
async fn rerun_after_seal_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    write_claims(&paths.claims, &sample_claims());
    let oracle = sample_oracle();
    generate_and_annotate(&paths, &oracle).await;
    let sealed = std::fs::read(&paths.programs).unwrap();

    let before = oracle.calls();
    let claims: Vec<ClaimRecord> = load_array(&paths.claims).unwrap();
    let summary = run_stage(&ProgramGenerator::new(&oracle), &claims, &paths.programs, pending()).await.unwrap();
    assert_eq!(summary.state, StageState::AlreadyComplete);
    assert_eq!(oracle.calls(), before);
    assert_eq!(std::fs::read(&paths.programs).unwrap(), sealed);
}

#[tokio::test]
async fn one_bad_claim_does_not_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let mut claims = sample_claims();
    claims.insert(1, ClaimRecord { id: 4, claim: None, label: Some(Label::FAKE) });
    write_claims(&paths.claims, &claims);
    let oracle = sample_oracle();

    let claims: Vec<ClaimRecord> = load_array(&paths.claims).unwrap();
    let summary = run_stage(&ProgramGenerator::new(&oracle), &claims, &paths.programs, pending()).await.unwrap();
    assert_eq!((summary.written, summary.failed), (3, 1));

    let programs: Vec<ProgramRecord> = load_array(&paths.programs).unwrap();
    assert_eq!(programs.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn execution_cut_mid_record_resumes_to_a_loadable_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    write_claims(&paths.claims, &sample_claims());
    let oracle = sample_oracle();
    generate_and_annotate(&paths, &oracle).await;

    let programs: Vec<ProgramRecord> = load_array(&paths.programs).unwrap();
    let table = AnnotationTable::load(&paths.annotations).unwrap();
    let executor = VerificationExecutor::new(&oracle, &table);
    let reference = dir.path().join("reference.json");
    run_stage(&executor, &programs, &reference, pending()).await.unwrap();
    let full = std::fs::read(&reference).unwrap();

    // keep the first record and half of the second, id included
    let text = String::from_utf8(full.clone()).unwrap();
    let second = text.find("},\n{").unwrap() + 4;
    let cut = second + text[second..].find("\"claim\"").unwrap() + 3;
    assert!(text[second..cut].contains("\"id\": 2"));
    std::fs::write(&paths.verification, &full[..cut]).unwrap();

    let summary = run_stage(&executor, &programs, &paths.verification, pending()).await.unwrap();
    assert_eq!((summary.skipped_existing, summary.written), (1, 2));
    let records: Vec<VerificationRecord> = load_array(&paths.verification).unwrap();
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(std::fs::read(&paths.verification).unwrap(), full);
}
