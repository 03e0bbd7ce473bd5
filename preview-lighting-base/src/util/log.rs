/// Provides the recommended log filter for programs which want to exclude particularly noisy
/// details of the lighting engine and its dependencies.
///
/// The guiding principle for this filtering is that at [`log::Level::Debug`] or lower level,
/// there should be no messages produced every surface/tick unless something is wrong.
/// Per-surface relighting messages are logged at [`log::Level::Trace`] and are dropped here.
#[allow(clippy::missing_inline_in_public_items)]
pub fn standard_filter(metadata: &log::Metadata<'_>) -> bool {
    let target = metadata.target();

    let per_surface_trace = metadata.level() >= log::Level::Trace
        && (target.starts_with("preview_lighting::lightmap")
            || target.starts_with("preview_lighting::light::shader"));

    !(per_surface_trace
        || target.starts_with("png::") // noisy
        || target.starts_with("clap_builder::")) // noisy at Debug level
}
