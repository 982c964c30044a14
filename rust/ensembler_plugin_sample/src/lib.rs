//! Sample ensembler plugin: a weighted average over per-model scores.
//!
//! Build as a `cdylib` and place the library under `lib/` of an artifact
//! directory whose `ensembler.yaml` points at it.

mod weighted;

use std::panic::{self, AssertUnwindSafe};
use std::sync::LazyLock;

use abi_stable::export_root_module;
use abi_stable::prefix_type::PrefixTypeTrait;
use abi_stable::std_types::{ROption, RResult, RStr, RString};
use ensembler_plugin_api::{EnsResult, EnsemblerManifestV1, EnsemblerMod, EnsemblerMod_Ref};
use ensembler_plugin_common::{panic_message, Artifacts, EnsembleInput, Ensembler, Headers};

pub use weighted::{WeightedAverage, WeightsConfig, WEIGHTS_ARTIFACT};

static ENSEMBLER: LazyLock<WeightedAverage> = LazyLock::new(WeightedAverage::new);

fn manifest() -> EnsemblerManifestV1 {
    EnsemblerManifestV1::current(
        "ensembler_plugin_sample",
        env!("CARGO_PKG_VERSION"),
        ENSEMBLER.capabilities(),
        Some("DOUBLE"),
    )
}

/// Run `body` and convert its outcome for the ABI. Panics must not unwind
/// across `extern "C"`, so they become errors here.
fn guarded<T>(body: impl FnOnce() -> Result<T, String>) -> EnsResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => RResult::ROk(value),
        Ok(Err(err)) => RResult::RErr(RString::from(err)),
        Err(payload) => RResult::RErr(RString::from(format!(
            "ensembler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

extern "C" fn plugin_manifest() -> EnsemblerManifestV1 {
    manifest()
}

extern "C" fn plugin_initialize(artifacts_json: RStr<'_>) -> EnsResult<()> {
    guarded(|| {
        let artifacts = serde_json::from_str::<Artifacts>(artifacts_json.as_str())
            .map_err(|err| format!("Invalid artifacts payload: {err}"))?;
        ENSEMBLER
            .initialize(&artifacts)
            .map_err(|err| err.to_string())
    })
}

extern "C" fn plugin_ensemble(
    input_json: RStr<'_>,
    headers_json: ROption<RString>,
) -> EnsResult<RString> {
    guarded(|| {
        let input: EnsembleInput = serde_json::from_str(input_json.as_str())
            .map_err(|err| format!("Invalid ensembler input: {err}"))?;
        let headers = match headers_json.into_option() {
            Some(raw) => Some(
                serde_json::from_str::<Headers>(raw.as_str())
                    .map_err(|err| format!("Invalid headers payload: {err}"))?,
            ),
            None => None,
        };
        let output = ENSEMBLER
            .ensemble(&input, headers.as_ref())
            .map_err(|err| err.to_string())?;
        serde_json::to_string(&output)
            .map(RString::from)
            .map_err(|err| format!("Ensembler output is not serializable: {err}"))
    })
}

#[export_root_module]
pub fn get_library() -> EnsemblerMod_Ref {
    EnsemblerMod {
        manifest: plugin_manifest,
        initialize: plugin_initialize,
        ensemble: plugin_ensemble,
    }
    .leak_into_prefix()
}
