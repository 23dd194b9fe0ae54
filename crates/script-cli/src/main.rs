use std::{env, fs, process::ExitCode, rc::Rc, time::Instant};

use script_vm::{CodeUnit, Engine, FunctionRegistry, StderrTracer, TypeRegistry, register_builtin_types};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.json" };
    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let code: CodeUnit = match serde_json::from_str(&source) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {file_path} is not a valid code unit: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut types = TypeRegistry::new();
    let mut functions = FunctionRegistry::new();
    register_builtin_types(&mut types, &mut functions);

    let mut engine = Engine::new(types, functions);
    if env::var_os("SCRIPT_VM_TRACE").is_some() {
        engine.set_tracer(Box::new(StderrTracer));
    }

    let start = Instant::now();
    match engine.run(Rc::new(code)) {
        Ok(value) => {
            eprintln!("success after: {:?}\n{value:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(_) => {
            eprintln!("error after: {:?}", start.elapsed());
            for err in engine.error_trace() {
                eprintln!("  {err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => return Err(format!("reading {file_path}: {err}")),
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
