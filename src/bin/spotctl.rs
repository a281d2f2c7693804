extern crate clap;
extern crate env_logger;
extern crate spotdb;

use clap::{App, Arg, SubCommand};

use spotdb::index::Index;
use spotdb::nodes::{retrieve, Retrieval};

use std::process;

fn main() {
    env_logger::init();

    let matches = App::new("spotctl")
        .about("inspect and query a spotdb index")
        .arg(Arg::with_name("path").long("path").takes_value(true).required(true).help("index directory"))
        .subcommand(SubCommand::with_name("add")
            .about("add one posting")
            .arg(Arg::with_name("token").required(true))
            .arg(Arg::with_name("value").required(true))
            .arg(Arg::with_name("docid").required(true)))
        .subcommand(SubCommand::with_name("query")
            .about("run a boolean AND query over one or more tokens")
            .arg(Arg::with_name("tokens").required(true).multiple(true))
            .arg(Arg::with_name("limit").long("limit").takes_value(true)))
        .subcommand(SubCommand::with_name("stats")
            .about("print bucket and insertion counts"))
        .get_matches();

    let path = matches.value_of("path").unwrap();

    let result = match matches.subcommand() {
        ("add", Some(sub)) => run_add(path, sub),
        ("query", Some(sub)) => run_query(path, sub),
        ("stats", Some(_)) => run_stats(path),
        _ => {
            eprintln!("no subcommand given, try `spotctl --help`");
            process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run_add(path: &str, sub: &clap::ArgMatches) -> spotdb::SpotResult<()> {
    let token = sub.value_of("token").unwrap();
    let value: u64 = sub.value_of("value").unwrap().parse()
        .map_err(|_| spotdb::SpotError::InvalidArgument("value must be a non-negative integer".to_string()))?;
    let docid: u64 = sub.value_of("docid").unwrap().parse()
        .map_err(|_| spotdb::SpotError::InvalidArgument("docid must be a non-negative integer".to_string()))?;

    let mut index = Index::open(path)?;
    index.add(token, docid, value)?;
    index.add_doc(docid, value)?;
    index.save()?;
    println!("added token={} value={} docid={}", token, value, docid);
    Ok(())
}

fn run_query(path: &str, sub: &clap::ArgMatches) -> spotdb::SpotResult<()> {
    let tokens: Vec<&str> = sub.values_of("tokens").unwrap().collect();
    let limit: usize = sub.value_of("limit").map(|s| s.parse().unwrap_or(100)).unwrap_or(100);

    let mut index = Index::open(path)?;
    let mut node = index.and_query(&tokens);
    match retrieve(node.as_mut(), &mut index, limit)? {
        Retrieval::Done(results) => print_results(&results),
        Retrieval::Partial(results, _state) => {
            print_results(&results);
            println!("... truncated at {} results", limit);
        }
    }
    Ok(())
}

fn print_results(results: &[(u64, u64)]) {
    for (value, docid) in results {
        println!("{}\t{}", value, docid);
    }
}

fn run_stats(path: &str) -> spotdb::SpotResult<()> {
    let index = Index::open(path)?;
    println!("buckets:    {}", index.header().num_buckets);
    println!("insertions: {}", index.header().num_insertions);
    println!("populated:  {}", index.header().buckets.len());
    Ok(())
}
