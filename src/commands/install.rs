//! The `install` subcommand: print `.mcp.json` wrapping instructions.

use crate::error::Result;

/// Show how to route an existing stdio server definition through the
/// gateway.
pub fn run() -> Result<()> {
    println!("To install the gateway wrapper, update your .mcp.json configuration:");
    println!();
    println!("Original:");
    println!("  \"server\": {{");
    println!("    \"type\": \"stdio\",");
    println!("    \"command\": \"npx\",");
    println!("    \"args\": [\"-y\", \"@upstash/context7-mcp\", \"--api-key\", \"YOUR_KEY\"]");
    println!("  }}");
    println!();
    println!("With gateway:");
    println!("  \"server\": {{");
    println!("    \"type\": \"stdio\",");
    println!("    \"command\": \"mcp-gateway\",");
    println!(
        "    \"args\": [\"stdio\", \"--\", \"npx\", \"-y\", \"@upstash/context7-mcp\", \"--api-key\", \"YOUR_KEY\"]"
    );
    println!("  }}");
    Ok(())
}
