use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::mem;
use std::path::PathBuf;
use std::process::exit;

use clap::{Arg, ArgAction, ArgMatches, command, value_parser};
use memmap2::MmapOptions;
use target_lexicon::{Architecture, Triple};

use bfjit::io::native_routines;
use bfjit::{compile, CellWidth, CompilationState, EofPolicy, Error, HostRoutines};


/// Number of cells in the heap of programs run with `--run`.
const STORAGE_SIZE: usize = 30_000;


fn main() {
    let argv = command!()
        .next_line_help(true)
        .arg(Arg::new("src_file")
            .value_name("SRC_FILE")
            .help("The brainfuck file, - for the standard input.")
            .required(true)
            .value_parser(value_parser!(PathBuf)))
        .arg(Arg::new("dst_file")
            .value_name("DST_FILE")
            .help("File to write the raw machine code to. Printed as hex if omitted.")
            .required(false)
            .value_parser(value_parser!(PathBuf)))
        .arg(Arg::new("cell_size")
            .short('s')
            .long("cell-size")
            .value_name("BYTES")
            .help("Size of one cell: 1, 2 or 4 bytes.")
            .default_value("1")
            .value_parser(parse_cell_width))
        .arg(Arg::new("eof")
            .short('e')
            .long("eof")
            .value_name("CODE")
            .help("Value read at the end of input, or 'unchanged' to leave the cell alone.")
            .default_value("0")
            .allow_hyphen_values(true)
            .value_parser(parse_eof_policy))
        .arg(Arg::new("heap")
            .long("heap")
            .value_name("ADDR")
            .help("Address of the heap the program works on.")
            .default_value("0")
            .value_parser(parse_address))
        .arg(Arg::new("base")
            .long("base")
            .value_name("ADDR")
            .help("Address the code will be loaded at.")
            .default_value("0")
            .value_parser(parse_address))
        .arg(Arg::new("output_routine")
            .long("output-routine")
            .value_name("ADDR")
            .help("Address of the host routine writing a byte.")
            .default_value("0")
            .value_parser(parse_address))
        .arg(Arg::new("input_routine")
            .long("input-routine")
            .value_name("ADDR")
            .help("Address of the host routine reading a byte.")
            .default_value("0")
            .value_parser(parse_address))
        .arg(Arg::new("capacity")
            .long("capacity")
            .value_name("BYTES")
            .help("Size of the code buffer.")
            .default_value("65536")
            .value_parser(value_parser!(usize)))
        .arg(Arg::new("run")
            .short('r')
            .long("run")
            .action(ArgAction::SetTrue)
            .help("Execute the compiled code (32-bit x86 hosts only).")
            .conflicts_with_all(["dst_file", "heap", "base", "output_routine", "input_routine"])
            .required(false))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help("Print a summary of the compilation to stderr.")
            .required(false))
        .get_matches();

    let options = Options::from_matches(&argv);

    let src_file = argv.get_one::<PathBuf>("src_file").unwrap();
    let source: Box<dyn Read> = if src_file.as_os_str() == "-" {
        Box::new(io::stdin())
    } else {
        match File::open(src_file) {
            Ok(file) => Box::new(file),
            Err(err) => {
                eprintln!("Error reading the Brainfuck file: {}", err);
                exit(1);
            },
        }
    };

    if argv.get_flag("run") {
        if let Err(err) = run(source, &options) {
            eprintln!("{}", err);
            exit(1);
        }
        return;
    }

    let mut code = vec![0_u8; options.capacity];
    let mut state = options.state(&mut code);
    let len = match compile(source, &mut state) {
        Ok(len) => len,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        },
    };
    options.report(len);
    code.truncate(len);

    let written = match argv.get_one::<PathBuf>("dst_file") {
        Some(dst_file) => fs::write(dst_file, &code),
        None => print_hex(&code),
    };
    if let Err(err) = written {
        eprintln!("Error writing the machine code: {}", err);
        exit(1);
    }
}


struct Options {
    cell_width: CellWidth,
    eof_policy: EofPolicy,
    heap: u32,
    base: u32,
    routines: HostRoutines,
    capacity: usize,
    verbose: bool,
}

impl Options {
    fn from_matches(argv: &ArgMatches) -> Self {
        // every option has a default value, so unwrapping can't fail
        Self {
            cell_width: *argv.get_one::<CellWidth>("cell_size").unwrap(),
            eof_policy: *argv.get_one::<EofPolicy>("eof").unwrap(),
            heap: *argv.get_one::<u32>("heap").unwrap(),
            base: *argv.get_one::<u32>("base").unwrap(),
            routines: HostRoutines {
                output_byte: *argv.get_one::<u32>("output_routine").unwrap(),
                input_byte: *argv.get_one::<u32>("input_routine").unwrap(),
            },
            capacity: *argv.get_one::<usize>("capacity").unwrap(),
            verbose: argv.get_flag("verbose"),
        }
    }

    fn state<'a>(&self, code: &'a mut [u8]) -> CompilationState<'a> {
        CompilationState::new(code, self.heap)
            .with_cell_width(self.cell_width)
            .with_eof_policy(self.eof_policy)
            .with_routines(self.routines)
            .with_load_address(self.base)
    }

    fn report(&self, len: usize) {
        if self.verbose {
            eprintln!(
                "Generated {} bytes of machine code ({}-byte cells, capacity {} bytes).",
                len,
                self.cell_width.bytes(),
                self.capacity,
            );
        }
    }
}


/// Compile and execute the code in this process.
fn run(source: impl Read, options: &Options) -> Result<(), Error> {
    if !matches!(Triple::host().architecture, Architecture::X86_32(_)) {
        return Err(Error::UnsupportedPlatform);
    }

    let mut heap = vec![0_u8; STORAGE_SIZE * options.cell_width.bytes() as usize];
    let mut code_buffer = MmapOptions::new().len(options.capacity).map_anon()?;
    let load_address = code_buffer.as_ptr() as usize as u32;

    let mut state = CompilationState::new(&mut code_buffer, heap.as_mut_ptr() as usize as u32)
        .with_cell_width(options.cell_width)
        .with_eof_policy(options.eof_policy)
        .with_routines(native_routines())
        .with_load_address(load_address);
    let len = compile(source, &mut state)?;
    options.report(len);

    let code_buffer = code_buffer.make_exec()?;
    unsafe {
        let code_fn: unsafe extern "C" fn() = mem::transmute(code_buffer.as_ptr());
        code_fn();
    }
    io::stdout().flush()?;

    drop(heap);
    Ok(())
}

fn print_hex(code: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for line in code.chunks(16) {
        let hex: Vec<String> = line.iter().map(|byte| format!("{:02X}", byte)).collect();
        writeln!(stdout, "{}", hex.join(" "))?;
    }
    Ok(())
}

fn parse_cell_width(s: &str) -> Result<CellWidth, Error> {
    let size = s.trim().parse::<u8>().map_err(|_| Error::InvalidCellWidth(0))?;
    CellWidth::try_from(size)
}

fn parse_eof_policy(s: &str) -> Result<EofPolicy, Error> {
    s.parse()
}

/// Parse a decimal or `0x`-prefixed hexadecimal 32-bit number.
fn parse_address(s: &str) -> Result<u32, Error> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| Error::InvalidAddress(s.to_owned()))
}
