/// The name of the ask folder (like .git)
pub const ASK_DIR: &str = ".ask";

/// Default index file name inside the ask folder
pub const DEFAULT_INDEX_FILE: &str = "index.json";

/// On-disk index format version. Any other value forces a rebuild.
pub const STORE_VERSION: &str = "1.0";

/// Default embedding model (fastembed model ID)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default max file size (100 KiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024;

/// Chunks shorter than this (in bytes, after trimming) are dropped
pub const MIN_CHUNK_SIZE: usize = 100;

/// Chunks longer than this are subdivided into line windows
pub const MAX_CHUNK_SIZE: usize = 2000;

/// Lines per window when subdividing an oversized chunk
pub const WINDOW_LINES: usize = 50;

/// Lines shared by consecutive windows
pub const WINDOW_OVERLAP: usize = 5;

/// Embedding input is cut to this many characters (~512 tokens)
pub const EMBED_CHAR_LIMIT: usize = 2000;

/// Report embedding progress every N chunks
pub const PROGRESS_INTERVAL: usize = 10;

/// Concurrent scoring calls per rerank batch
pub const RERANK_CONCURRENCY: usize = 5;

/// Default number of coarse candidates
pub const DEFAULT_TOP_N: usize = 20;

/// Default number of reranked results passed to generation
pub const DEFAULT_TOP_K: usize = 5;

/// Default include globs
pub const DEFAULT_INCLUDE: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.py", "**/*.rs",
];

/// Default exclude globs: dependencies, build output, tests, hidden directories
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/*.test.*",
    "**/*.spec.*",
    "**/.*/**",
];

/// Answer returned when no context survived reranking
pub const INSUFFICIENT_CONTEXT: &str =
    "No relevant code was found in the index, so this question cannot be answered.";
