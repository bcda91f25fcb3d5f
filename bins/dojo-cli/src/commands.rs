// CLI commands for practicing challenges
use anyhow::{bail, Context, Result};
use dojo_common::catalog::{ChallengeCatalog, DEFAULT_CATALOG_PATH};
use dojo_common::config::EngineConfig;
use dojo_common::types::{Challenge, ExecutionPhase, Language, SubmissionResult};
use dojo_engine::{
    normalize_output, Celebration, CelebrationError, ChallengeEngine, ChallengeSession,
    SessionError, SessionView, SubmissionError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Prints a banner when every test case passes
struct ConfettiCelebration;

impl Celebration for ConfettiCelebration {
    fn celebrate(&self, result: &SubmissionResult) -> Result<(), CelebrationError> {
        println!("\n🎉🎊 All {} test cases passed! 🎊🎉", result.total());
        Ok(())
    }
}

/// Resolve the catalog path: flag, then $DOJO_CHALLENGES, then the default
fn catalog_path(flag: Option<&Path>) -> PathBuf {
    match flag {
        Some(path) => path.to_path_buf(),
        None => std::env::var("DOJO_CHALLENGES")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH)),
    }
}

pub fn load_catalog(flag: Option<&Path>) -> Result<ChallengeCatalog> {
    let path = catalog_path(flag);
    ChallengeCatalog::load(&path)
        .with_context(|| format!("Failed to load challenges from {}", path.display()))
}

fn find<'a>(catalog: &'a ChallengeCatalog, slug: &str) -> Result<&'a Challenge> {
    match catalog.get(slug) {
        Some(challenge) => Ok(challenge),
        None => bail!(
            "Unknown challenge '{}'. Available: {}",
            slug,
            catalog.slugs().join(", ")
        ),
    }
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

fn build_engine() -> Result<ChallengeEngine> {
    ChallengeEngine::new(EngineConfig::from_env()).context("Failed to initialize execution engine")
}

/// List every challenge
pub fn list_challenges(catalog: &ChallengeCatalog, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(catalog.list())
            .context("Failed to serialize challenges")?;
        println!("{}", out);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No challenges available.");
        return Ok(());
    }

    println!("📋 Challenges:\n");
    println!("{:<20} {:<28} {:<8} {:<6}", "SLUG", "TITLE", "LEVEL", "POINTS");
    println!("{}", "─".repeat(66));

    for challenge in catalog.list() {
        println!(
            "{:<20} {:<28} {:<8} {:<6}",
            challenge.slug,
            challenge.title,
            format!("{:?}", challenge.difficulty),
            challenge.points
        );
    }

    println!("\n✅ Total: {} challenge(s)", catalog.len());
    Ok(())
}

/// Show a challenge statement with its sample
pub fn show_challenge(catalog: &ChallengeCatalog, slug: &str) -> Result<()> {
    let challenge = find(catalog, slug)?;

    println!("📝 {} ({:?}, {} points)\n", challenge.title, challenge.difficulty, challenge.points);
    println!("{}\n", challenge.description);
    println!("Input:  {}", challenge.input_format);
    println!("Output: {}\n", challenge.output_format);
    println!("Sample input:\n{}\n", challenge.sample_input);
    println!("Sample output:\n{}", challenge.sample_output);

    let languages: Vec<&str> = Language::all()
        .into_iter()
        .filter(|lang| challenge.starter_code(*lang).is_some())
        .map(|lang| lang.display_name())
        .collect();
    println!("\n💡 Starter code: {}", languages.join(", "));
    Ok(())
}

/// Print the starter code for a language
pub fn print_starter(catalog: &ChallengeCatalog, slug: &str, lang: Language) -> Result<()> {
    let challenge = find(catalog, slug)?;
    match challenge.starter_code(lang) {
        Some(code) => {
            println!("{}", code);
            Ok(())
        }
        None => bail!("Challenge '{}' has no {} starter code", slug, lang.display_name()),
    }
}

fn open_session(engine: ChallengeEngine, challenge: &Challenge) -> ChallengeSession {
    ChallengeSession::new(Arc::new(engine), challenge.clone())
}

/// Run once through the session, printing remote phases as they arrive
async fn run_in_session(
    session: &ChallengeSession,
    lang: Language,
    source: &str,
    input: Option<&str>,
) -> Result<SessionView> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ExecutionPhase>();
    let printer = tokio::spawn(async move {
        while let Some(phase) = rx.recv().await {
            if phase != ExecutionPhase::Idle {
                println!("  ⏳ {}", phase.label());
            }
        }
    });

    let phases = if lang.runs_in_process() { None } else { Some(&tx) };
    let view = session.run(lang, source, input, phases).await;
    drop(tx);
    printer.await.context("Phase printer stopped unexpectedly")?;

    Ok(view?)
}

/// Submit through the session. An aborted suite becomes an error naming the case.
async fn submit_in_session(
    session: &ChallengeSession,
    lang: Language,
    source: &str,
) -> Result<SubmissionResult> {
    match session.submit(lang, source).await {
        Ok(result) => Ok(result),
        Err(SessionError::Submission(SubmissionError::TestFailed { case, error })) => {
            println!("  ✗ Test {} stopped the submission", case + 1);
            bail!("Test failed: {}", error)
        }
        Err(e) => Err(e.into()),
    }
}

fn matches_sample(challenge: &Challenge, view: &SessionView) -> bool {
    normalize_output(view.logs.join("\n").as_str())
        == normalize_output(challenge.sample_output.as_str())
}

/// Run a solution once, streaming remote phases as they happen
pub async fn run_solution(
    catalog: &ChallengeCatalog,
    slug: &str,
    lang: Language,
    file: &Path,
    input: Option<&str>,
) -> Result<()> {
    let challenge = find(catalog, slug)?;
    let source = read_source(file)?;
    let session = open_session(build_engine()?, challenge);

    println!("🚀 Running {} ({})...", file.display(), lang.display_name());

    let view = run_in_session(&session, lang, &source, input).await?;

    println!("\n📤 Output:");
    if view.logs.is_empty() {
        println!("  (no output)");
    }
    for line in &view.logs {
        println!("{}", line);
    }

    if let Some(error) = &view.error {
        println!("\n❌ {}", error);
        std::process::exit(1);
    }

    if input.map_or(true, |i| i == challenge.sample_input) {
        if matches_sample(challenge, &view) {
            println!("\n✅ Matches the sample output");
        } else {
            println!(
                "\n⚠️  Differs from the sample output:\n{}",
                normalize_output(challenge.sample_output.as_str())
            );
        }
    }

    Ok(())
}

/// Submit a solution against every test case
pub async fn submit_solution(
    catalog: &ChallengeCatalog,
    slug: &str,
    lang: Language,
    file: &Path,
) -> Result<()> {
    let challenge = find(catalog, slug)?;
    let source = read_source(file)?;
    let engine = build_engine()?.with_celebration(Arc::new(ConfettiCelebration));
    let session = open_session(engine, challenge);

    println!(
        "📨 Submitting {} to '{}' ({} test cases)...",
        file.display(),
        challenge.slug,
        challenge.test_cases.len()
    );

    let result = submit_in_session(&session, lang, &source).await?;
    for case in result.cases() {
        let mark = if case.passed { "✓" } else { "✗" };
        println!("  {} Test {}", mark, case.index + 1);
    }
    println!("\n{} / {} passed", result.passed(), result.total());
    if !result.success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dojo_engine::SessionOutcome;
    use std::io::Write;

    #[test]
    fn test_catalog_path_prefers_flag() {
        let path = catalog_path(Some(Path::new("custom.json")));
        assert_eq!(path, PathBuf::from("custom.json"));
    }

    #[test]
    fn test_unknown_slug_lists_available() {
        let catalog = load_catalog(Some(
            &Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/challenges.json"),
        ))
        .unwrap();

        let err = find(&catalog, "nope").unwrap_err().to_string();
        assert!(err.contains("Unknown challenge 'nope'"));
        assert!(err.contains("sum-two-numbers"));
    }

    const SUM_TS: &str = r#"
const a: number = Number(readline());
const b: number = Number(readline());
console.log(a + b);
"#;

    fn engine() -> ChallengeEngine {
        ChallengeEngine::new(EngineConfig::default()).unwrap()
    }

    fn sum_challenge() -> Challenge {
        let catalog = load_catalog(Some(
            &Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/challenges.json"),
        ))
        .unwrap();
        find(&catalog, "sum-two-numbers").unwrap().clone()
    }

    #[tokio::test]
    async fn test_run_goes_through_session() {
        let challenge = sum_challenge();
        let session = open_session(engine(), &challenge);

        let view = run_in_session(&session, Language::TypeScript, SUM_TS, None)
            .await
            .unwrap();

        assert_eq!(view.logs, vec!["7"]);
        assert!(view.error.is_none());
        assert!(matches_sample(&challenge, &view));
        assert_eq!(session.view().outcome, Some(SessionOutcome::Success));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_run_error_lands_in_view() {
        let challenge = sum_challenge();
        let session = open_session(engine(), &challenge);

        let view = run_in_session(
            &session,
            Language::TypeScript,
            "console.log(missing);",
            Some("1\n2"),
        )
        .await
        .unwrap();

        assert!(view.error.is_some());
        assert_eq!(session.view().outcome, Some(SessionOutcome::ExecutionError));
    }

    #[tokio::test]
    async fn test_submit_goes_through_session() {
        let challenge = sum_challenge();
        let session = open_session(engine(), &challenge);

        let result = submit_in_session(&session, Language::TypeScript, SUM_TS)
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.total(), challenge.test_cases.len());
        assert_eq!(session.view().submission, Some(result));
        assert_eq!(session.view().outcome, Some(SessionOutcome::Success));
    }

    #[tokio::test]
    async fn test_aborted_submission_names_the_case() {
        let challenge = sum_challenge();
        let session = open_session(engine(), &challenge);

        let source = "throw new Error(\"nope\");";
        let err = submit_in_session(&session, Language::TypeScript, source)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Test failed:"), "{}", err);
        assert!(err.to_string().contains("nope"), "{}", err);
        assert_eq!(session.view().outcome, Some(SessionOutcome::ExecutionError));
    }

    #[test]
    fn test_read_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"console.log(1);").unwrap();

        assert_eq!(read_source(file.path()).unwrap(), "console.log(1);");
        assert!(read_source(Path::new("missing.ts")).is_err());
    }
}
