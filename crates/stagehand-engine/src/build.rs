//! Build driver: package a component's context, request an image build,
//! record the build.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use stagehand_store::MetadataStore;
use stagehand_types::id::{ComponentId, FlowId};
use stagehand_types::record::BuildRecord;
use stagehand_types::spec::ComponentSpec;

use crate::driver::{ContainerDriver, ImageBuildOptions};
use crate::errors::EngineError;
use crate::host::Clock;
use crate::pack::pack_context;
use crate::run_blocking;
use crate::spec::{parse_component_spec, validate_component_spec};

/// Build a fresh image for one component.
///
/// Packages the component's build context (honoring `.dockerignore`), tags
/// the image with the derived build id plus its `:latest` alias, forwards
/// the engine's build output verbatim to `sink`, and persists the build
/// record on success.
///
/// # Errors
///
/// `ComponentNotFound`, `InvalidSpecification`, `ContextPackagingFailed`,
/// `ImageBuildFailed`, or a store persistence failure. Driver and
/// persistence errors carry the attempted build id.
pub(crate) async fn build_component(
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    clock: Arc<dyn Clock>,
    component_id: ComponentId,
    sink: &mut (dyn Write + Send),
    cancel: &CancellationToken,
) -> Result<BuildRecord, EngineError> {
    let (component, spec) = {
        let store = store.clone();
        run_blocking(move || {
            let component = store.select_component(&component_id)?;
            let spec: ComponentSpec = parse_component_spec(&component.spec_path)?;
            validate_component_spec(&spec)?;
            Ok((component, spec))
        })
        .await?
    };

    let build = BuildRecord::new(component.id.clone(), clock.now_unix())?;
    let context = stagehand_types::record::resolve_path(
        &component.context_path,
        &spec.build.context,
    );

    tracing::info!(
        component = %component.id,
        build = %build.id,
        context = %context.display(),
        "Packaging build context"
    );
    let archive = {
        let context = context.clone();
        run_blocking(move || {
            pack_context(&context).map_err(|source| EngineError::ContextPackagingFailed {
                path: context.clone(),
                source,
            })
        })
        .await?
    };

    let options = ImageBuildOptions {
        tags: vec![build.id.to_string(), build.latest_alias()],
        dockerfile: spec.build.dockerfile.clone(),
        remove_intermediate: true,
    };
    let body = driver
        .build_image(cancel, archive, &options)
        .await
        .map_err(|source| EngineError::ImageBuildFailed {
            build_id: build.id.clone(),
            source,
        })?;
    sink.write_all(&body)
        .map_err(|e| EngineError::Internal(anyhow::anyhow!("writing build output: {e}")))?;

    {
        let store = store.clone();
        let record = build.clone();
        run_blocking(move || store.insert_build(&record).map_err(EngineError::from)).await?;
    }

    tracing::info!(build = %build.id, "Build recorded");
    Ok(build)
}

/// Build every distinct component referenced by a flow, one image per
/// component regardless of how many steps use it.
///
/// Returns the build per component id. Builds run sequentially; the first
/// failure aborts the remainder.
///
/// # Errors
///
/// `FlowNotFound`, `InvalidSpecification`, or any [`build_component`]
/// error.
pub(crate) async fn build_flow(
    store: Arc<dyn MetadataStore>,
    driver: Arc<dyn ContainerDriver>,
    clock: Arc<dyn Clock>,
    flow_id: FlowId,
    sink: &mut (dyn Write + Send),
    cancel: &CancellationToken,
) -> Result<BTreeMap<ComponentId, BuildRecord>, EngineError> {
    let spec = {
        let store = store.clone();
        run_blocking(move || {
            let flow = store.select_flow(&flow_id)?;
            let spec = crate::spec::parse_flow_spec(&flow.spec_path)?;
            crate::spec::validate_flow_spec(&spec)?;
            Ok(spec)
        })
        .await?
    };

    let mut builds = BTreeMap::new();
    for component_id in spec.steps.values() {
        if builds.contains_key(component_id) {
            continue;
        }
        let build = build_component(
            store.clone(),
            driver.clone(),
            clock.clone(),
            component_id.clone(),
            sink,
            cancel,
        )
        .await?;
        builds.insert(component_id.clone(), build);
    }

    Ok(builds)
}
