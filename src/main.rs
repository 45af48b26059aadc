fn main() -> Result<(), Box<dyn std::error::Error>> {
    mediscan_chat::cli::main()
}
