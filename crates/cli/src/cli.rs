use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "scenelink")]
#[command(about = "Scenelink operator console - drive a remote engine session from the terminal")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Backend session endpoint (default: $SCENELINK_SERVER)
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Authenticated identity (default: $SCENELINK_IDENTITY)
    #[arg(long, global = true, value_name = "ID")]
    pub identity: Option<String>,

    /// Scene/project resource to control (default: $SCENELINK_SCENE)
    #[arg(long, global = true, value_name = "REF")]
    pub scene: Option<String>,

    /// Discovery signaling endpoint (default: $SCENELINK_SIGNALING)
    #[arg(long, global = true, value_name = "URL")]
    pub signaling: Option<String>,

    /// Producer identity to stream from (default: $SCENELINK_PRODUCER)
    #[arg(long, global = true, value_name = "NAME")]
    pub producer: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and stream session events to stdout until interrupted
    Watch {
        /// Negotiate the peer-to-peer viewport stream once fully connected
        #[arg(long)]
        stream: bool,

        /// Use the discovery signaling endpoint instead of the control channel
        #[arg(long, requires = "stream")]
        discover: bool,
    },
    /// Send a direct command to the engine add-on and await its result
    Command {
        /// Command name understood by the add-on
        name: String,

        /// Command parameters as JSON
        #[arg(long, value_name = "JSON")]
        params: Option<String>,

        /// Target add-on id (default add-on when omitted)
        #[arg(long, value_name = "ID")]
        addon: Option<String>,
    },
    /// Ask the backend agent and await its response
    Ask {
        /// Free-form request for the agent
        message: String,

        /// Ask the backend to rebuild its scene context first
        #[arg(long)]
        refresh_context: bool,
    },
}
