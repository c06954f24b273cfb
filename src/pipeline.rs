use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;

use crate::archive::extract_archives;
use crate::cleanup::prune_empty_dirs;
use crate::config::Args;
use crate::converters::ConverterSet;
use crate::dispatcher::run_batch;
use crate::error::PipelineError;
use crate::gate::{Notifier, RunGate};
use crate::indexer::{build_files_index, FilesIndex, RunContext};
use crate::layout::{ensure_base_dirs, OutputLayout};
use crate::repair::repair_first_sample;
use crate::scanner::scan_inputs;
use crate::splits::{find_empty_samples, write_image_sets};
use crate::types::{ErrorLog, Modality, RunReport};
use crate::utils::create_progress_bar;
use crate::validation::{CrossModalValidator, Validator};

/// Discover inputs, build the output tree and assign every file its output path
pub fn prepare_run(args: &Args) -> Result<(OutputLayout, FilesIndex), PipelineError> {
    prepare_run_with(args, None)
}

/// Same as [`prepare_run`], optionally with a fixed run context
pub fn prepare_run_with(
    args: &Args,
    context: Option<RunContext>,
) -> Result<(OutputLayout, FilesIndex), PipelineError> {
    args.validate()?;
    let modalities = args.selected_modalities()?;

    let input_dir = args.input_dir();
    let output_dir = args.output_dir();
    ensure_base_dirs(&input_dir, &output_dir)?;
    let layout = OutputLayout::build(&output_dir, &args.top_folder)?;

    let root = fs::canonicalize(args.root_dir())?;
    if args.extract_archives {
        extract_archives(&root, &input_dir, Some(layout.top_dir()), args.no_progress)?;
    }

    let mut scan_for = modalities.clone();
    if !scan_for.contains(&Modality::Label) {
        scan_for.push(Modality::Label);
    }
    // Extracted files must be found even when the input dir lies outside the root
    let roots = [root.clone(), input_dir];
    let mut file_sets = scan_inputs(&roots, &scan_for, Some(layout.top_dir()));
    let canonical = file_sets.get(&Modality::Label).cloned().unwrap_or_default();
    file_sets.retain(|modality, _| modalities.contains(modality));

    if canonical.is_empty() {
        warn!("No annotation files found under {}", root.display());
    }

    let context = match context {
        Some(context) => context,
        None if args.shuffle => RunContext::shuffled(canonical.len(), args.seed),
        None => RunContext::sequential(),
    };

    let index = build_files_index(&file_sets, &canonical, &layout, &context);
    Ok((layout, index))
}

/// Convert each modality in turn, stopping at the first batch with failures.
///
/// Batches never overlap: one modality's pool fully drains before the next
/// one starts. Returns the number of converted files per modality.
pub fn convert_all(
    index: &FilesIndex,
    converters: &ConverterSet,
    gate: &RunGate<'_>,
    args: &Args,
) -> Result<BTreeMap<Modality, usize>, PipelineError> {
    let mut converted = BTreeMap::new();

    for (modality, files) in &index.modalities {
        let jobs = files.jobs(*modality);
        info!(
            "{} converting... ({} file(s), {} workers)",
            modality,
            jobs.len(),
            args.num_threads
        );

        let pb = create_progress_bar(jobs.len() as u64, modality.name(), args.no_progress);
        let errors = if jobs.is_empty() {
            ErrorLog::new()
        } else {
            run_batch(
                *modality,
                converters.for_modality(*modality),
                &jobs,
                args.num_threads,
                &pb,
            )?
        };
        pb.finish_and_clear();

        errors.extend(files.rejected.iter().cloned());
        gate.check(*modality, &errors)?;
        converted.insert(*modality, jobs.len());
    }

    Ok(converted)
}

/// Main conversion pipeline
pub fn run(
    args: &Args,
    converters: &ConverterSet,
    notifier: &dyn Notifier,
) -> Result<RunReport, PipelineError> {
    run_with(args, converters, notifier, &CrossModalValidator, None)
}

/// Main conversion pipeline with every collaborator supplied by the caller
pub fn run_with(
    args: &Args,
    converters: &ConverterSet,
    notifier: &dyn Notifier,
    validator: &dyn Validator,
    context: Option<RunContext>,
) -> Result<RunReport, PipelineError> {
    info!("Validating data...");
    let (layout, mut index) = prepare_run_with(args, context)?;
    validator.validate(&index)?;

    let gate = RunGate::new(notifier);
    let converted = convert_all(&index, converters, &gate, args)?;

    let empty = find_empty_samples(&index);
    if !empty.is_empty() {
        info!("{} sample(s) without objects", empty.len());
    }
    repair_first_sample(&empty, &mut index)?;

    let splits = write_image_sets(
        layout.image_sets_dir(),
        index.sample_count,
        &empty,
        args.train_val_ratio,
    )?;

    if args.prune_empty_dirs {
        prune_empty_dirs(&args.input_dir());
    }

    info!("-----conversion has been finished-----");
    Ok(RunReport {
        sample_count: index.sample_count,
        converted,
        empty_samples: empty.len(),
        splits,
    })
}
