use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock Unipol Move listening on {addr}");
    println!(
        "contract {} / user {} / password {:?}",
        mock_server::CONTRACT_ID,
        mock_server::USERNAME,
        mock_server::PASSWORD
    );
    mock_server::run(listener, mock_server::MockState::default()).await
}
