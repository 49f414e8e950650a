//! Maven builder.

use std::sync::Arc;

use async_trait::async_trait;

use super::{run_toolchain, BuildAction, Builder};
use crate::error::BuildError;
use crate::execution::{ContainerEngine, ExecutionLimits, RunSpec};
use crate::snapshot::Snapshot;

/// Default image for Maven builds.
pub const DEFAULT_MAVEN_IMAGE: &str = "maven:3.9-eclipse-temurin-21";

/// Builds and tests Java projects with `mvn`.
pub struct MavenBuilder {
    engine: Arc<dyn ContainerEngine>,
    image: String,
    limits: ExecutionLimits,
}

impl MavenBuilder {
    /// Creates a builder using [`DEFAULT_MAVEN_IMAGE`].
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            image: DEFAULT_MAVEN_IMAGE.to_string(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Overrides the toolchain image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Overrides container resource limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Image used for builds.
    pub fn image(&self) -> &str {
        &self.image
    }

    fn spec(&self, action: BuildAction) -> RunSpec {
        let goal = match action {
            BuildAction::Build => "package",
            BuildAction::Test => "test",
        };
        // batch mode keeps download progress out of stderr
        RunSpec::new(&self.image, ["mvn", "--batch-mode", goal]).with_limits(self.limits.clone())
    }
}

#[async_trait]
impl Builder for MavenBuilder {
    fn name(&self) -> &str {
        "maven"
    }

    fn description(&self) -> &str {
        "Java projects built with Apache Maven (pom.xml)"
    }

    async fn build(&self, snapshot: &Snapshot) -> Result<(), BuildError> {
        let spec = self.spec(BuildAction::Build);
        run_toolchain(self.engine.as_ref(), &spec, BuildAction::Build, snapshot).await
    }

    async fn test(&self, snapshot: &Snapshot) -> Result<(), BuildError> {
        let spec = self.spec(BuildAction::Test);
        run_toolchain(self.engine.as_ref(), &spec, BuildAction::Test, snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::ScriptedEngine;

    fn project() -> Snapshot {
        Snapshot::empty()
            .with_new_file("pom.xml", "<project/>")
            .unwrap()
            .with_new_file("src/main/java/App.java", "class App {}")
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_runs_mvn_package() {
        let engine = Arc::new(ScriptedEngine::new());
        let builder = MavenBuilder::new(engine.clone());

        builder.build(&project()).await.unwrap();

        assert_eq!(
            engine.commands(),
            vec![vec!["mvn", "--batch-mode", "package"]]
        );
        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls[0].0.image, DEFAULT_MAVEN_IMAGE);
        assert_eq!(calls[0].1, project().digest());
    }

    #[tokio::test]
    async fn test_test_runs_mvn_test() {
        let engine = Arc::new(ScriptedEngine::new());
        let builder = MavenBuilder::new(engine.clone()).with_image("maven:3.9-eclipse-temurin-17");

        builder.test(&project()).await.unwrap();

        assert_eq!(engine.commands(), vec![vec!["mvn", "--batch-mode", "test"]]);
        assert_eq!(
            engine.calls.lock().unwrap()[0].0.image,
            "maven:3.9-eclipse-temurin-17"
        );
    }

    #[tokio::test]
    async fn test_compile_error_is_build_failure() {
        let engine = Arc::new(
            ScriptedEngine::new().exit(1, "[ERROR] App.java:[1,12] ';' expected"),
        );
        let builder = MavenBuilder::new(engine);

        let err = builder.build(&project()).await.unwrap_err();

        assert_eq!(err.diagnostics(), Some("[ERROR] App.java:[1,12] ';' expected"));
        assert!(matches!(err, BuildError::BuildFailure { .. }));
    }

    #[tokio::test]
    async fn test_compile_error_on_stdout_is_reported() {
        let engine = Arc::new(ScriptedEngine::new().output(
            1,
            "[INFO] BUILD FAILURE\n[ERROR] COMPILATION ERROR :\n[ERROR] /src/src/main/java/App.java:[3,5] cannot find symbol\n",
            "",
        ));
        let builder = MavenBuilder::new(engine);

        let err = builder.build(&project()).await.unwrap_err();

        let diagnostics = err.diagnostics().unwrap();
        assert!(diagnostics.contains("[ERROR] COMPILATION ERROR"));
        assert!(diagnostics.contains("cannot find symbol"));
    }

    #[tokio::test]
    async fn test_failing_tests_are_test_failure() {
        let engine = Arc::new(ScriptedEngine::new().exit(1, "Tests run: 3, Failures: 1"));
        let builder = MavenBuilder::new(engine);

        let err = builder.run(BuildAction::Test, &project()).await.unwrap_err();

        assert!(matches!(err, BuildError::TestFailure { .. }));
    }

    #[test]
    fn test_name() {
        let builder = MavenBuilder::new(Arc::new(ScriptedEngine::new()));
        assert_eq!(builder.name(), "maven");
        assert_eq!(builder.image(), DEFAULT_MAVEN_IMAGE);
    }
}
