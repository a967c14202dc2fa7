use std::io::{self, BufRead, BufWriter, Write};

use clap::Parser;
use itertools::Itertools;
use miette::{IntoDiagnostic, miette};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xpr_lang::{AnyExpression, AnyExpressionBuilder, Expression, ExpressionBuilder, Options, ParsedExpression, Report, Value};

#[derive(Parser, Debug, Default)]
#[command(name = "xpr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Evaluate arithmetic, logical and string expressions",
    after_help = "# Examples:\n\n\
    ## Evaluate an expression:\n\
    xpr '1 + 2 * 3'\n\n\
    ## Define constants:\n\
    xpr -D width=320 -D left=8 'width / 2 + left'\n\n\
    ## Work with strings:\n\
    xpr --any -D name=world \"'Hello, ' + name\"\n\n\
    ## Evaluate one expression per line:\n\
    printf '1 + 1\\n2 * 3\\n' | xpr"
)]
pub struct Cli {
    /// Expression to evaluate. Reads one expression per line from stdin when omitted
    expression: Option<String>,

    /// Define a constant as NAME=VALUE
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = parse_definition)]
    defines: Vec<(String, String)>,

    /// Enable boolean and conditional operators
    #[arg(long = "bool")]
    bool_symbols: bool,

    /// Disable constant folding
    #[arg(long)]
    no_optimize: bool,

    /// Treat functions and operators as pure so calls with constant arguments are folded
    #[arg(long)]
    pure: bool,

    /// Evaluate with strings, booleans and nil in addition to numbers
    #[arg(long)]
    any: bool,

    /// Print the optimized expression instead of its value
    #[arg(long, conflicts_with = "symbols")]
    print: bool,

    /// Print the symbols the expression still refers to, one per line
    #[arg(long)]
    symbols: bool,

    /// Parse without the shared parse cache
    #[arg(long)]
    no_cache: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_definition(definition: &str) -> Result<(String, String), String> {
    match definition.split_once('=') {
        Some((name, value)) if xpr_lang::is_valid_identifier(name.trim()) => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        Some((name, _)) => Err(format!("`{}` is not a valid name", name.trim())),
        None => Err(format!("expected NAME=VALUE, found `{}`", definition)),
    }
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        self.init_tracing();

        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());

        match &self.expression {
            Some(source) => {
                let output = self.execute(source)?;
                writeln!(handle, "{}", output).into_diagnostic()?;
            }
            None => {
                let mut failed = 0usize;

                for line in io::stdin().lock().lines() {
                    let line = line.into_diagnostic()?;
                    let source = line.trim();
                    if source.is_empty() {
                        continue;
                    }

                    match self.execute(source) {
                        Ok(output) => writeln!(handle, "{}", output).into_diagnostic()?,
                        Err(e) => {
                            handle.flush().into_diagnostic()?;
                            eprintln!("{:?}", e);
                            failed += 1;
                        }
                    }
                }

                if failed > 0 {
                    handle.flush().into_diagnostic()?;
                    return Err(miette!(
                        "{} expression{} failed",
                        failed,
                        if failed == 1 { "" } else { "s" }
                    ));
                }
            }
        }

        handle.flush().into_diagnostic()
    }

    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_env("XPR_LOG")
            .unwrap_or_else(|_| EnvFilter::new(if self.verbose { "debug" } else { "warn" }));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    }

    fn options(&self) -> Options {
        let mut options = Options::empty();
        options.set(Options::BOOL_SYMBOLS, self.bool_symbols);
        options.set(Options::NO_OPTIMIZE, self.no_optimize);
        options.set(Options::PURE_SYMBOLS, self.pure);
        options
    }

    fn parse(&self, source: &str) -> ParsedExpression {
        if self.no_cache {
            ParsedExpression::parse(source)
        } else {
            xpr_lang::parse(source)
        }
    }

    fn execute(&self, source: &str) -> miette::Result<String> {
        let parsed = self.parse(source);
        if let Some(error) = parsed.error() {
            return Err(miette::Report::new(Report::new(source, error.clone())));
        }

        debug!(expression = %parsed, any = self.any, "Evaluating");

        if self.any {
            self.execute_any(source, parsed)
        } else {
            self.execute_numeric(source, parsed)
        }
    }

    fn execute_numeric(&self, source: &str, parsed: ParsedExpression) -> miette::Result<String> {
        let constants = self
            .defines
            .iter()
            .map(|(name, value)| {
                value
                    .parse::<f64>()
                    .map(|number| (name.as_str(), number))
                    .map_err(|_| miette!("Constant `{}` is not a number, use --any for string values", name))
            })
            .collect::<miette::Result<Vec<_>>>()?;

        let expression: Expression = ExpressionBuilder::from(parsed)
            .options(self.options())
            .constants(constants)
            .build();

        if self.print {
            return Ok(expression.to_string());
        }

        if self.symbols {
            return Ok(expression.symbols().iter().sorted().join("\n"));
        }

        expression
            .evaluate()
            .map(xpr_lang::format_number)
            .map_err(|e| miette::Report::new(Report::new(source, e)))
    }

    fn execute_any(&self, source: &str, parsed: ParsedExpression) -> miette::Result<String> {
        let constants = self.defines.iter().map(|(name, value)| {
            let value = match value.parse::<f64>() {
                Ok(number) => Value::Number(number),
                Err(_) => Value::from(value.as_str()),
            };
            (name.as_str(), value)
        });

        let mut expression: AnyExpression = AnyExpressionBuilder::from(parsed)
            .options(self.options())
            .constants(constants)
            .build();

        if self.print {
            return Ok(expression.to_string());
        }

        if self.symbols {
            return Ok(expression.symbols().iter().sorted().join("\n"));
        }

        expression
            .evaluate()
            .map(|value| value.to_string())
            .map_err(|e| miette::Report::new(Report::new(source, e)))
    }
}
