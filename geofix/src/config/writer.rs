//! INI serialization: `ConfigFile` → commented config.ini text.

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[full]
; Survey-grade profile. Samples until the target accuracy is reached or
; max_wait_secs passes, then fails if the best fix is worse than the hard max.
max_wait_secs = {}
target_accuracy_m = {}
hard_max_accuracy_m = {}
; Timeout of the one-shot read raced against the sample stream
fallback_timeout_secs = {}

[quick]
; Field-entry profile. Never fails on accuracy; results worse than
; soft_accuracy_m are flagged as coarse.
max_wait_secs = {}
soft_accuracy_m = {}
; true: take a single reading. false: sample until max_wait_secs.
single_shot = {}

[engine]
; Wait for the permission prompt to be answered
preflight_timeout_secs = {}
; Extra time after the deadline for in-flight readings (0 to disable)
deadline_grace_ms = {}

[gpsd]
address = {}

[logging]
file = {}
"#,
        config.full.max_wait_secs,
        config.full.target_accuracy_m,
        config.full.hard_max_accuracy_m,
        config.full.fallback_timeout_secs,
        config.quick.max_wait_secs,
        config.quick.soft_accuracy_m,
        config.quick.single_shot,
        config.engine.preflight_timeout_secs,
        config.engine.deadline_grace_ms,
        config.gpsd.address,
        config.logging.file.display(),
    )
}
