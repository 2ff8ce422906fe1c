//! Doctor command handler: pre-flight checks and data directories.

use clap::Args;
use finagent_core::config::{AppConfig, SearchBackend};
use finagent_core::{AppError, AppResult};
use std::path::Path;

const DATA_DIRS: [&str; 4] = ["data/sample_pdfs", "data/images", "data/uploads", "logs"];

/// Pre-flight configuration checks
#[derive(Args, Debug)]
pub struct DoctorCommand {}

#[derive(Debug, PartialEq)]
struct Check {
    name: &'static str,
    passed: bool,
    detail: String,
}

fn run_checks(config: &AppConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    let env_file = config.workspace.join(".env");
    checks.push(Check {
        name: ".env file",
        passed: env_file.is_file(),
        detail: if env_file.is_file() {
            format!("found at {}", env_file.display())
        } else {
            format!("not found at {} (copy .env.example and fill it in)", env_file.display())
        },
    });

    if config.provider == "azure-openai" {
        let missing = config.missing_required_vars();
        checks.push(Check {
            name: "Azure OpenAI",
            passed: missing.is_empty(),
            detail: if missing.is_empty() {
                format!("deployment {}", config.azure.deployment)
            } else {
                format!("missing {}", missing.join(", "))
            },
        });
    } else {
        checks.push(Check {
            name: "LLM provider",
            passed: config.validate().is_ok(),
            detail: format!("{} ({})", config.provider, config.chat_model()),
        });
    }

    let search = match config.search_backend() {
        SearchBackend::Azure => {
            let configured = config.search.endpoint.is_some() && config.search.api_key.is_some();
            Check {
                name: "Search",
                passed: configured,
                detail: if configured {
                    format!("Azure AI Search index {}", config.search.index_name)
                } else {
                    "AZURE_SEARCH_ENDPOINT and AZURE_SEARCH_API_KEY are required".to_string()
                },
            }
        }
        SearchBackend::Local => Check {
            name: "Search",
            passed: true,
            detail: format!("local index at {}", config.local_index_path().display()),
        },
    };
    checks.push(search);

    checks
}

fn create_data_dirs(workspace: &Path) -> AppResult<()> {
    for dir in DATA_DIRS {
        std::fs::create_dir_all(workspace.join(dir))?;
    }
    Ok(())
}

impl DoctorCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Running pre-flight checks");

        let checks = run_checks(config);
        for check in &checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            println!("[{:>4}] {:<14} {}", mark, check.name, check.detail);
        }

        create_data_dirs(&config.workspace)?;
        println!("Data directories ready under {}", config.workspace.display());

        let failed = checks.iter().filter(|c| !c.passed).count();
        if failed > 0 {
            return Err(AppError::Config(format!("{} pre-flight check(s) failed", failed)));
        }
        println!("All checks passed.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn config(dir: &TempDir, env: &[(&str, &str)]) -> AppConfig {
        let mut vars: HashMap<String, String> =
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        vars.insert(
            "FINAGENT_WORKSPACE".to_string(),
            dir.path().display().to_string(),
        );
        AppConfig::load_with_env(&vars).unwrap()
    }

    #[test]
    fn test_checks_fail_without_azure_settings() {
        let dir = TempDir::new().unwrap();
        let checks = run_checks(&config(&dir, &[]));

        assert!(!checks[0].passed);
        assert!(!checks[1].passed);
        assert!(checks[1].detail.contains("AZURE_OPENAI_ENDPOINT"));
        assert!(checks[2].passed);
    }

    #[test]
    fn test_checks_pass_when_configured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "").unwrap();
        let checks = run_checks(&config(
            &dir,
            &[
                ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
                ("AZURE_OPENAI_API_KEY", "key"),
            ],
        ));

        assert!(checks.iter().all(|c| c.passed), "{:?}", checks);
    }

    #[test]
    fn test_create_data_dirs() {
        let dir = TempDir::new().unwrap();
        create_data_dirs(dir.path()).unwrap();
        for sub in DATA_DIRS {
            assert!(dir.path().join(sub).is_dir());
        }
    }
}
