use anyhow::{anyhow, Context, Result};
use cogsaw::candidates::select_candidates;
use cogsaw::cli::{parse_args, Cli, Commands};
use cogsaw::complexity::annotate;
use cogsaw::config::Config;
use cogsaw::io::{create_writer, read_file, write_file, OutputFormat};
use cogsaw::oracle::{persistence, RefactoringOracle};
use cogsaw::planner::Planner;
use cogsaw::source_model::{JavaSourceModel, SourceModel};
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();
    let cli = parse_args();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Analyze {
            path,
            method,
            threshold,
            engine,
            run_order,
            max_evaluations,
            format,
            output,
        } => {
            let mut planner = config.planner();
            if let Some(t) = threshold {
                planner.threshold = t;
            }
            if let Some(e) = engine {
                planner.engine = e;
            }
            if let Some(o) = run_order {
                planner.order = o.into();
            }
            if let Some(cap) = max_evaluations {
                planner.max_evaluations = cap;
            }
            analyze(&path, method, planner, format, output.as_deref())
        }
        Commands::Refactor {
            path,
            method,
            threshold,
            engine,
            write,
            output,
        } => {
            let mut planner = config.planner();
            if let Some(t) = threshold {
                planner.threshold = t;
            }
            if let Some(e) = engine {
                planner.engine = e;
            }
            refactor(&path, method, planner, write, output.as_deref())
        }
        Commands::Cache {
            path,
            method,
            output,
        } => dump_cache(&path, method, output.as_deref()),
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

fn analyze(
    path: &Path,
    method: Option<usize>,
    planner: Planner,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let source = read_file(path)?;
    let mut reports = planner.plan_source(&source)?;
    if let Some(index) = method {
        if index >= reports.len() {
            return Err(anyhow!(
                "method index {} out of range, file has {} methods",
                index,
                reports.len()
            ));
        }
        reports = vec![reports.swap_remove(index)];
    }
    write_with(format, output, |writer| writer.write_reports(&reports))
}

fn refactor(
    path: &Path,
    method: Option<usize>,
    planner: Planner,
    write: bool,
    output: Option<&Path>,
) -> Result<()> {
    let source = read_file(path)?;
    let mut model = JavaSourceModel::new()?;
    let trees = model.parse_all(&source)?;

    let index = match method {
        Some(index) if index < trees.len() => index,
        Some(index) => {
            return Err(anyhow!(
                "method index {} out of range, file has {} methods",
                index,
                trees.len()
            ))
        }
        None => trees
            .iter()
            .position(|t| annotate(t).method_complexity() > planner.threshold)
            .ok_or_else(|| {
                anyhow!("no method is over the threshold of {}", planner.threshold)
            })?,
    };

    let (plan, applied) = planner.refactor_method(&mut model, &trees[index])?;
    log::info!(
        "{}: {} extractions, residual CC {}",
        plan.report.method,
        applied.len(),
        plan.report.residual_complexity
    );

    match (write, output) {
        (true, _) => write_file(path, &applied.text)?,
        (false, Some(out)) => write_file(out, &applied.text)?,
        (false, None) => print!("{}", applied.text),
    }
    Ok(())
}

fn dump_cache(path: &Path, method: usize, output: Option<&Path>) -> Result<()> {
    let source = read_file(path)?;
    let mut model = JavaSourceModel::new()?;
    let mut trees = model.parse_all(&source)?;
    if method >= trees.len() {
        return Err(anyhow!(
            "method index {} out of range, file has {} methods",
            method,
            trees.len()
        ));
    }
    let tree = trees.swap_remove(method);

    let notes = annotate(&tree);
    let candidates = select_candidates(&tree, &notes);
    let mut oracle = RefactoringOracle::new(&mut model, &tree, &notes);
    oracle.prefill(&candidates);
    let rows = oracle.export_rows();

    match output {
        Some(out) => {
            let mut file = fs::File::create(out)?;
            persistence::export_csv(&rows, &mut file)?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            persistence::export_csv(&rows, &mut stdout)?;
        }
    }
    Ok(())
}

fn write_with<F>(format: OutputFormat, output: Option<&Path>, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn cogsaw::io::OutputWriter) -> Result<()>,
{
    match output {
        Some(path) => {
            let file = fs::File::create(path)?;
            let mut writer = create_writer(format, file);
            f(writer.as_mut())
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = create_writer(format, stdout);
            f(writer.as_mut())
        }
    }
}
