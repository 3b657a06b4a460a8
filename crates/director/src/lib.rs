//! Generation orchestrator: drives one storyboard session through
//! analyze -> plan -> sequential frame rendering -> completion.
//!
//! Frame generation is strictly sequential by frame number with one request
//! in flight at a time, so upstream load stays bounded and every status
//! change is observable between frames. A frame failure marks that frame and
//! moves on; an analysis or planning failure ends the whole run.

use gen_client::GenerationClient;
use storyboard::{
    DirectorConsole, FrameStatus, GeneratedFrame, GenerationConfig, LogPhase, ReferenceImage,
    SessionState, SEQUENCE_LEN,
};
use thiserror::Error;
use tracing::warn;

/// Caller contract violations: conditions under which a run never starts.
/// Failures inside a started run are session states, not errors.
#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("no reference image loaded")]
    NoReferenceImage,
    #[error("action description is empty")]
    EmptyAction,
    #[error("cannot start a run from {0}; reset the session first")]
    NotIdle(SessionState),
}

pub struct DirectorSession<C> {
    client: C,
    config: GenerationConfig,
    state: SessionState,
    reference: Option<ReferenceImage>,
    frames: Vec<GeneratedFrame>,
    console: DirectorConsole,
}

impl<C: GenerationClient> DirectorSession<C> {
    pub fn new(client: C, config: GenerationConfig) -> Self {
        Self {
            client,
            config,
            state: SessionState::Idle,
            reference: None,
            frames: Vec::new(),
            console: DirectorConsole::new(),
        }
    }

    /// Replace the session's reference image wholesale.
    pub fn load_reference(&mut self, image: ReferenceImage) {
        self.reference = Some(image);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frames(&self) -> &[GeneratedFrame] {
        &self.frames
    }

    pub fn console(&self) -> &DirectorConsole {
        &self.console
    }

    /// Append an entry to the session log from outside the pipeline
    /// (export progress, packaging failures).
    pub fn log(&mut self, phase: LogPhase, message: impl Into<String>) {
        self.console.push(phase, message);
    }

    /// Run the full pipeline. Returns the terminal state: `Complete` when
    /// all frames reached a terminal status (failures included), `Error`
    /// when analysis or planning failed. Upstream failures never surface as
    /// `Err`; they are recorded in the log and the session state.
    pub async fn run(&mut self, action: &str) -> Result<SessionState, DirectorError> {
        if self.state != SessionState::Idle {
            return Err(DirectorError::NotIdle(self.state));
        }
        let reference = self
            .reference
            .clone()
            .ok_or(DirectorError::NoReferenceImage)?;
        let action = action.trim();
        if action.is_empty() {
            return Err(DirectorError::EmptyAction);
        }

        self.state = SessionState::Analyzing;
        self.console.clear();
        self.frames.clear();

        self.console
            .push(LogPhase::Init, "核心引擎已就绪，正在接入视觉语义网络...");
        self.console.push(
            LogPhase::DnaAnalysis,
            "深度提取参考图特征：骨骼构图、光效分布、角色肤色服装...",
        );
        let analyzed = self.client.analyze_reference(&reference).await;
        let analysis = match analyzed {
            Ok(analysis) => analysis,
            Err(err) => return Ok(self.fail(err)),
        };
        let dna_excerpt: String = analysis.character_dna.chars().take(45).collect();
        self.console.push(
            LogPhase::Lock,
            format!("人物DNA解析完成: {}...", dna_excerpt),
        );

        self.state = SessionState::Planning;
        self.console.push(
            LogPhase::Planning,
            "导演正在编写 9 镜头叙事脚本 (Sequence Planning)...",
        );
        let planned = self.client.plan_sequence(&analysis, action).await;
        let plans = match planned {
            Ok(plans) => plans,
            Err(err) => return Ok(self.fail(err)),
        };

        self.frames = plans.into_iter().map(GeneratedFrame::pending).collect();
        self.console
            .push(LogPhase::Directing, "脚本定稿。进入强制一致性渲染阶段。");

        self.state = SessionState::Generating;
        for idx in 0..self.frames.len() {
            let plan = self.frames[idx].plan.clone();
            self.frames[idx].mark_generating();
            self.console.push(
                LogPhase::Render,
                format!(
                    "帧 {}/{}: [{}] 正在同步渲染...",
                    plan.frame_number, SEQUENCE_LEN, plan.shot_type
                ),
            );

            let rendered = self
                .client
                .generate_frame(&plan, &reference, &self.config)
                .await;
            match rendered {
                Ok(image_url) => self.frames[idx].mark_done(image_url),
                Err(err) => {
                    warn!(frame = plan.frame_number, error = %err, "frame generation failed");
                    self.frames[idx].mark_error();
                    self.console.push(
                        LogPhase::Warning,
                        format!("帧 {} 渲染受到干扰，已尝试自动修正。", plan.frame_number),
                    );
                }
            }
        }

        self.console
            .push(LogPhase::Output, "分镜脚本全序列生成完毕。角色特征已完美复刻。");
        self.state = SessionState::Complete;
        Ok(self.state)
    }

    /// Return to `Idle`, clearing frames and log. The reference image is
    /// kept so a new run can reuse it.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.frames.clear();
        self.console.clear();
    }

    fn fail(&mut self, err: gen_client::GenError) -> SessionState {
        // A planning failure must leave no partial frame state behind.
        self.frames.clear();
        self.console.push(LogPhase::Failure, err.to_string());
        self.state = SessionState::Error;
        self.state
    }

    pub fn done_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.status == FrameStatus::Done)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|f| f.status == FrameStatus::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gen_client::MockClient;
    use storyboard::StoryboardFramePlan;

    fn reference() -> ReferenceImage {
        ReferenceImage {
            mime_type: "image/png".to_string(),
            data: "QUJD".to_string(),
        }
    }

    fn session(client: MockClient) -> DirectorSession<MockClient> {
        let mut session = DirectorSession::new(client, GenerationConfig::default());
        session.load_reference(reference());
        session
    }

    #[tokio::test]
    async fn test_successful_run_completes_all_frames() {
        let mut session = session(MockClient::new());
        let state = session.run("她穿过雨夜回家").await.unwrap();

        assert_eq!(state, SessionState::Complete);
        assert_eq!(session.frames().len(), SEQUENCE_LEN);
        assert!(session
            .frames()
            .iter()
            .all(|f| f.status == FrameStatus::Done && f.image_url.is_some()));
        let ids: Vec<_> = session.frames().iter().map(|f| f.id).collect();
        assert_eq!(ids, (1..=9).collect::<Vec<_>>());
        assert_eq!(session.console().with_phase(LogPhase::Output).count(), 1);
    }

    #[tokio::test]
    async fn test_frame_failure_does_not_abort_run() {
        // Frames 1-8 succeed, frame 9 fails.
        let mut session = session(MockClient::new().with_failing_frame(9));
        let state = session.run("story").await.unwrap();

        assert_eq!(state, SessionState::Complete);
        assert_eq!(session.done_count(), 8);
        assert_eq!(session.error_count(), 1);
        let frame9 = &session.frames()[8];
        assert_eq!(frame9.id, 9);
        assert_eq!(frame9.status, FrameStatus::Error);
        assert!(frame9.image_url.is_none());

        let warnings: Vec<_> = session
            .console()
            .with_phase(LogPhase::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("帧 9"));
    }

    #[tokio::test]
    async fn test_frames_render_in_strictly_ascending_order() {
        let client = MockClient::new().with_failing_frame(3);
        let order = client.generated_order();
        let mut session = session(client);
        session.run("story").await.unwrap();

        // One request per frame, ascending, failures included.
        assert_eq!(*order.lock().unwrap(), (1..=9).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_every_frame_failing_still_completes() {
        let mut client = MockClient::new();
        for n in 1..=9 {
            client = client.with_failing_frame(n);
        }
        let mut session = session(client);
        let state = session.run("story").await.unwrap();

        assert_eq!(state, SessionState::Complete);
        assert_eq!(session.error_count(), 9);
        assert!(session.frames().iter().all(|f| f.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_analysis_failure_is_fatal() {
        let mut session = session(MockClient::new().with_failing_analysis());
        let state = session.run("story").await.unwrap();

        assert_eq!(state, SessionState::Error);
        assert!(session.frames().is_empty());
        assert_eq!(session.console().with_phase(LogPhase::Failure).count(), 1);
    }

    #[tokio::test]
    async fn test_planning_failure_is_fatal_with_no_frames() {
        let mut session = session(MockClient::new().with_failing_planning());
        let state = session.run("story").await.unwrap();

        assert_eq!(state, SessionState::Error);
        assert!(session.frames().is_empty());
    }

    #[tokio::test]
    async fn test_short_plan_from_backend_is_fatal() {
        let bad_plans: Vec<_> = (1..=5)
            .map(|n| StoryboardFramePlan {
                frame_number: n,
                shot_type: "WS".to_string(),
                prompt: "p".to_string(),
                description: "d".to_string(),
            })
            .collect();
        let mut session = session(MockClient::new().with_plans(bad_plans));
        let state = session.run("story").await.unwrap();
        assert_eq!(state, SessionState::Error);
        assert!(session.frames().is_empty());
    }

    #[tokio::test]
    async fn test_run_requires_reference_image() {
        let mut session = DirectorSession::new(MockClient::new(), GenerationConfig::default());
        let err = session.run("story").await.unwrap_err();
        assert!(matches!(err, DirectorError::NoReferenceImage));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_run_requires_non_empty_action() {
        let mut session = session(MockClient::new());
        let err = session.run("   ").await.unwrap_err();
        assert!(matches!(err, DirectorError::EmptyAction));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_new_run_requires_reset_after_complete() {
        let mut session = session(MockClient::new());
        session.run("story").await.unwrap();
        assert_eq!(session.state(), SessionState::Complete);

        let err = session.run("another story").await.unwrap_err();
        assert!(matches!(
            err,
            DirectorError::NotIdle(SessionState::Complete)
        ));

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.frames().is_empty());
        assert!(session.console().is_empty());

        let state = session.run("another story").await.unwrap();
        assert_eq!(state, SessionState::Complete);
    }
}
