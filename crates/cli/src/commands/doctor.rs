use serde::Serialize;
use yaruki_core::config::{AppConfig, LoadOptions};
use yaruki_dify::{DifyClient, WorkflowApp};
use yaruki_slack::{SlackApi, SlackWebClient};

use super::{CommandResult, EXIT_CHECK_FAILURE, EXIT_CONFIG_FAILURE, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn exit_code(&self) -> u8 {
        let failed = |name: &str| {
            self.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
        };
        if failed("config_validation") {
            EXIT_CONFIG_FAILURE
        } else if self.overall_status == CheckStatus::Fail {
            EXIT_CHECK_FAILURE
        } else {
            EXIT_OK
        }
    }
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_auth(&config));
            checks.push(check_dify_configuration(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_auth", "dify_configuration"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_auth(config: &AppConfig) -> DoctorCheck {
    let fail = |details: String| DoctorCheck { name: "slack_auth", status: CheckStatus::Fail, details };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return fail(format!("failed to initialize async runtime: {error}")),
    };

    let client = match SlackWebClient::new(config.slack.bot_token.clone(), config.slack.api_base_url.clone()) {
        Ok(client) => client,
        Err(error) => return fail(error.to_string()),
    };

    match runtime.block_on(client.auth_test()) {
        Ok(identity) => DoctorCheck {
            name: "slack_auth",
            status: CheckStatus::Pass,
            details: format!(
                "authenticated as `{}` in team `{}`",
                identity.user.as_deref().unwrap_or("unknown"),
                identity.team.as_deref().unwrap_or("unknown"),
            ),
        },
        Err(error) => fail(format!("auth.test failed: {error}")),
    }
}

fn check_dify_configuration(config: &AppConfig) -> DoctorCheck {
    match DifyClient::from_config(&config.dify) {
        Ok(_) => {
            let apps = [
                WorkflowApp::Softener,
                WorkflowApp::Illustration,
                WorkflowApp::TaskExtractor,
                WorkflowApp::Assistant,
            ]
            .map(|app| app.as_str())
            .join(", ");
            DoctorCheck {
                name: "dify_configuration",
                status: CheckStatus::Pass,
                details: format!("workflow apps [{apps}] configured at `{}`", config.dify.workflow_url),
            }
        }
        Err(error) => DoctorCheck {
            name: "dify_configuration",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
