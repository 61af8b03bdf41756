use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod content;
pub mod events;
pub mod level;
pub mod registry;
pub mod session;
pub mod session_state;
pub mod stages;
pub mod status;
pub mod transition;

pub use content::{
    load_campaign, parse_campaign_json, validate_campaign, CampaignDatabase, CampaignDoc,
    CampaignError, EntryPointDef, LevelDef, LevelEntityDef, ObjectiveDef, StageDef, Vec2Def,
    CAMPAIGN_FORMAT_VERSION,
};
pub use events::{EventBus, EventKind, GameEvent, SubscriberId, TimerError};
pub use level::{EntryPoint, LevelEntity, LevelId, LevelWorld, PlayerState, Vec2};
pub use registry::{ActiveLevel, LevelEntityRegistry, SnapshotApplyStats};
pub use session::GameSession;
pub use session_state::{EntityKind, LevelSnapshot, SessionStateCache, SnapshotEntry};
pub use stages::{stage_timer_name, StageConfig, StageDescriptor, StageId, StageProgression};
pub use status::{
    GameStatus, GameStatusMachine, TIME_SCALE_FROZEN, TIME_SCALE_RUNNING,
};
pub use transition::{
    FadeOverlay, LevelLoadError, LevelProvider, LoadPoll, TransitionOrchestrator,
    TransitionUpdate, UnloadPoll, DEFAULT_FADE_DURATION_SECONDS,
};

pub const ROOT_ENV_VAR: &str = "LANTERNFALL_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub campaign_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "LANTERNFALL_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/lanternfall\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let campaign_file = root.join("assets").join("campaign.json");

    Ok(AppPaths {
        root,
        campaign_file,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let cwd = env::current_dir().expect("cwd");
        assert!(!is_repo_marker(&cwd.join("definitely_not_a_marker")));
    }

    #[test]
    fn repo_marker_accepts_a_crates_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        std::fs::create_dir(dir.path().join("crates")).expect("crates dir");
        assert!(is_repo_marker(dir.path()));
    }
}
