use std::cell::RefCell;
use std::fs;
use std::path::Path;

use auji_core::error::EnvironmentError;
use auji_core::process::CapturedOutput;
use auji_core::{
    CommandSpec, Error, LaunchConfig, Launcher, ProcessExit, ProcessRunner, Provision, VirtualEnv,
};
use tempfile::TempDir;

/// Pretends to be the interpreter: `-m venv` lays out an interpreter file,
/// everything else succeeds unless its first module is in `failing`.
struct FakeInterpreter {
    calls: RefCell<Vec<CommandSpec>>,
    failing: Vec<&'static str>,
}

impl FakeInterpreter {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failing: Vec::new(),
        }
    }

    fn failing(module: &'static str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failing: vec![module],
        }
    }

    fn modules(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| c.args.get(1).cloned())
            .collect()
    }
}

impl ProcessRunner for FakeInterpreter {
    fn run(&self, spec: &CommandSpec) -> auji_core::Result<ProcessExit> {
        self.calls.borrow_mut().push(spec.clone());

        if self.failing.iter().any(|m| spec.runs_module(m)) {
            return Ok(ProcessExit::from_code(1));
        }

        if spec.runs_module("venv") {
            let venv = VirtualEnv::new(&spec.args[2]);
            let interpreter = venv.interpreter_path();
            fs::create_dir_all(interpreter.parent().unwrap())?;
            fs::write(&interpreter, b"#!fake")?;
            fs::write(venv.root().join("pyvenv.cfg"), b"home = /usr/bin\n")?;
        }

        Ok(ProcessExit::from_code(0))
    }

    fn capture(&self, spec: &CommandSpec) -> auji_core::Result<CapturedOutput> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(CapturedOutput {
            status: ProcessExit::from_code(0),
            stdout: "Python 3.11.9\n".to_string(),
            stderr: String::new(),
        })
    }
}

fn project(with_manifest: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("app")).unwrap();
    fs::write(dir.path().join("app").join("main.py"), "app = object()\n").unwrap();
    if with_manifest {
        fs::write(dir.path().join("requirements.txt"), "fastapi\nuvicorn[standard]\n").unwrap();
    }
    dir
}

fn launcher(dir: &Path, runner: FakeInterpreter) -> Launcher<FakeInterpreter> {
    Launcher::with_runner(LaunchConfig::default(), dir, runner).unwrap()
}

#[test]
fn test_first_launch_provisions_and_serves() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    let outcome = launcher.run().unwrap();

    assert_eq!(outcome.provision, Provision::Created);
    assert_eq!(outcome.exit.exit_code(), 0);
    assert_eq!(
        launcher.runner().modules(),
        vec!["venv", "pip", "pip", "uvicorn"]
    );
}

#[test]
fn test_second_launch_is_idempotent() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    launcher.run().unwrap();
    let outcome = launcher.run().unwrap();

    assert_eq!(outcome.provision, Provision::Reused);
    assert_eq!(
        launcher.runner().modules(),
        vec!["venv", "pip", "pip", "uvicorn", "uvicorn"]
    );
}

#[test]
fn test_missing_manifest_fails_visibly() {
    let dir = project(false);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    let err = launcher.run().unwrap_err();

    assert!(matches!(
        err,
        Error::Environment(EnvironmentError::ManifestMissing(_))
    ));
    assert!(err.to_string().contains("requirements.txt"));
    assert!(launcher.runner().modules().is_empty());
}

#[test]
fn test_failed_pip_aborts_and_rolls_back() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::failing("pip"));

    let err = launcher.run().unwrap_err();

    assert!(err.to_string().contains("upgrade-packaging"));
    assert_eq!(launcher.runner().modules(), vec!["venv", "pip"]);
    assert!(!dir.path().join(".venv").exists());
}

#[test]
fn test_project_root_cannot_be_the_environment() {
    let dir = project(true);
    let mut config = LaunchConfig::default();
    config.environment.dir = ".".into();

    let result = Launcher::with_runner(config, dir.path(), FakeInterpreter::failing("pip"));

    assert!(result.is_err());
    assert!(dir.path().join("app").join("main.py").is_file());
    assert!(dir.path().join("requirements.txt").is_file());
}

#[test]
fn test_failed_setup_keeps_existing_directory_contents() {
    let dir = project(true);
    fs::create_dir_all(dir.path().join(".venv")).unwrap();
    fs::write(dir.path().join(".venv").join("notes.txt"), "keep me").unwrap();
    let launcher = launcher(dir.path(), FakeInterpreter::failing("pip"));

    assert!(launcher.run().is_err());
    assert!(dir.path().join(".venv").join("notes.txt").is_file());
}

#[test]
fn test_clean_after_launch_removes_environment() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    launcher.run().unwrap();
    assert!(launcher.clean().unwrap());
    assert!(!dir.path().join(".venv").exists());
    assert!(dir.path().join("app").join("main.py").is_file());
}

#[test]
fn test_deleting_environment_reproduces_setup() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    launcher.run().unwrap();
    fs::remove_dir_all(dir.path().join(".venv")).unwrap();
    let outcome = launcher.run().unwrap();

    assert_eq!(outcome.provision, Provision::Created);
    assert_eq!(
        launcher
            .runner()
            .modules()
            .iter()
            .filter(|m| *m == "venv")
            .count(),
        2
    );
}

#[test]
fn test_server_targets_loopback_app() {
    let dir = project(true);
    let launcher = launcher(dir.path(), FakeInterpreter::new());

    launcher.run().unwrap();
    let calls = launcher.runner().calls.borrow();
    let server = calls.last().unwrap();

    assert_eq!(server.program, launcher.venv().interpreter_path());
    assert_eq!(
        server.args.join(" "),
        "-m uvicorn app.main:app --reload --host 127.0.0.1 --port 8000"
    );
    assert_eq!(server.current_dir.as_deref(), Some(dir.path()));
    assert_eq!(
        server.env.get("SCRAPER_HEADLESS").map(String::as_str),
        Some("1")
    );
    assert!(std::env::var("SCRAPER_HEADLESS").is_err());
}
