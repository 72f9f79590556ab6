use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sparsetree::{EnumParentsOptions, EnumSubTreeOptions, EnumeratedNode, SparseTree, TreeConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sparsetree", about = "Query a sparse path tree built from a token list")]
struct Cli {
    /// Element separator (default: `/`).
    #[arg(long, conflicts_with = "fixed_length")]
    separator: Option<char>,
    /// Split tokens into elements of this many characters instead.
    #[arg(long)]
    fixed_length: Option<usize>,
    /// Compare elements case-sensitively.
    #[arg(long)]
    case_sensitive: bool,
    /// Log tree mutations to stderr.
    #[arg(short, long)]
    verbose: bool,
    /// Token list: one token per line, optionally followed by a tab and a value.
    paths: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value stored under a token.
    Get {
        token: String,
        /// Fall back to the closest stored ancestor.
        #[arg(long)]
        closest: bool,
    },
    /// List the direct stored children of a token (default: the root).
    Children { token: Option<String> },
    /// List stored tokens without a stored ancestor.
    Roots,
    /// Walk from a token up to the root.
    Parents {
        token: String,
        /// Include unstored intermediate positions.
        #[arg(long)]
        sparse: bool,
        /// Print has-children and no-children-below columns.
        #[arg(long)]
        additional: bool,
    },
    /// Walk the subtree below a token (default: the whole tree).
    Subtree {
        token: Option<String>,
        /// Maximum number of elements below the token.
        #[arg(long)]
        depth: Option<usize>,
        /// Include unstored intermediate positions.
        #[arg(long)]
        sparse: bool,
        /// Print the starting token first.
        #[arg(long)]
        include_root: bool,
        /// Print has-children and no-children-below columns.
        #[arg(long)]
        additional: bool,
    },
    /// Print the stored token and root counts.
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match cli.fixed_length {
        Some(length) => TreeConfig::fixed_length(length),
        None => TreeConfig::separated(cli.separator.unwrap_or('/')),
    };
    config.case_sensitive = cli.case_sensitive;

    let tree = load_tree(&cli.paths, &config)?;

    match cli.command {
        Commands::Get { token, closest } => match tree.get_with(&token, !closest) {
            Some(value) => println!("{}\t{}", token, value),
            None => bail!("token not found: {}", token),
        },
        Commands::Children { token } => {
            for (token, value) in tree.enum_children(token.as_deref())? {
                println!("{}\t{}", token, value);
            }
        }
        Commands::Roots => {
            for node in tree.enum_roots() {
                print_node(&node, false);
            }
        }
        Commands::Parents {
            token,
            sparse,
            additional,
        } => {
            let mut options = EnumParentsOptions::empty();
            options.set(EnumParentsOptions::ENUMERATE_SPARSE_NODES, sparse);
            options.set(EnumParentsOptions::INCLUDE_ADDITIONAL_DATA, additional);

            for node in tree.enum_parents(&token, options)? {
                print_node(&node, additional);
            }
        }
        Commands::Subtree {
            token,
            depth,
            sparse,
            include_root,
            additional,
        } => {
            let mut options = EnumSubTreeOptions::empty();
            options.set(EnumSubTreeOptions::ENUMERATE_SPARSE_NODES, sparse);
            options.set(EnumSubTreeOptions::ENUMERATE_SUB_TREE_ROOT, include_root);
            options.set(EnumSubTreeOptions::INCLUDE_ADDITIONAL_DATA, additional);

            let depth = depth.unwrap_or(usize::MAX);
            for node in tree.enum_sub_tree(token.as_deref(), options, depth)? {
                print_node(&node, additional);
            }
        }
        Commands::Stats => {
            println!("count\t{}", tree.count());
            println!("roots\t{}", tree.enum_roots().len());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_tree(path: &Path, config: &TreeConfig) -> Result<SparseTree<String>> {
    let mut tree = config.build().context("invalid tree configuration")?;

    let reader = BufReader::new(
        File::open(path).with_context(|| format!("failed to open token list {}", path.display()))?,
    );

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let (token, value) = match line.split_once('\t') {
            Some((token, value)) => (token, value.to_string()),
            None => (line.as_str(), (line_no + 1).to_string()),
        };

        let mut replaced = false;
        tree.modify_in_place(token, |_, current| {
            replaced = current.is_some();
            value
        })
        .with_context(|| format!("invalid token '{}' on line {}", token, line_no + 1))?;

        if replaced {
            warn!(line = line_no + 1, token, "duplicate token, keeping the later value");
        }
    }

    info!(count = tree.count(), "loaded token list");
    Ok(tree)
}

fn print_node(node: &EnumeratedNode<'_, String>, additional: bool) {
    let value = node.value.map_or("-", String::as_str);

    if additional {
        println!(
            "{}\t{}\t{}\t{}",
            node.token,
            value,
            node.has_children,
            node.no_children_below.as_deref().unwrap_or("-")
        );
    } else {
        println!("{}\t{}", node.token, value);
    }
}
