use xdb_stream::{PipelineConnector, PollOutcome, QuerySession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let sql = std::env::args().nth(1).unwrap_or_else(|| {
        "SELECT ONLINE l_returnflag, count(*), sum(l_extendedprice) FROM lineitem GROUP BY l_returnflag"
            .to_owned()
    });

    let connector = PipelineConnector::from_env().map_err(anyhow::Error::msg)?;
    let mut session = QuerySession::new(connector);

    loop {
        match session.poll(&sql).await {
            PollOutcome::Intermediate(table) => {
                println!("-- {} rows so far", session.row_count());
                println!("{table}");
            }
            PollOutcome::Final(text) => {
                println!("-- final");
                println!("{text}");
                return Ok(());
            }
            PollOutcome::Error(message) => anyhow::bail!(message),
        }
    }
}
