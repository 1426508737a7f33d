// ABOUTME: Stages command implementation.
// ABOUTME: Prints the fixed stage catalogue and the flags that skip each stage.

use rollout::output::{Output, OutputMode};
use rollout::stage::StageId;
use serde::Serialize;

#[derive(Serialize)]
struct StageEntry {
    ordinal: usize,
    stage: StageId,
    skipped_by: Vec<String>,
    summary: &'static str,
}

pub fn list_stages(output: &Output) {
    let entries: Vec<StageEntry> = StageId::ALL
        .iter()
        .enumerate()
        .map(|(index, stage)| StageEntry {
            ordinal: index + 1,
            stage: *stage,
            skipped_by: stage.skipped_by().iter().map(|f| f.to_string()).collect(),
            summary: stage.summary(),
        })
        .collect();

    if output.mode() == OutputMode::Json {
        for entry in &entries {
            if let Ok(json) = serde_json::to_string(entry) {
                println!("{json}");
            }
        }
        return;
    }

    for entry in &entries {
        let skip = if entry.skipped_by.is_empty() {
            "always runs".to_string()
        } else {
            entry.skipped_by.join(", ")
        };
        println!(
            "{}. {:<28} {:<40} [{}]",
            entry.ordinal, entry.stage, entry.summary, skip
        );
    }
}
