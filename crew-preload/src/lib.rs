//! `crew-preload.so`: the `LD_PRELOAD` half (§4.9, §8). Exported C symbols
//! live in `hooks_exec` and `hooks_path`; `exec` and `originals` are the
//! machinery tying them back into `crew-preload-common`.

mod exec;
mod hooks_exec;
mod hooks_path;
mod originals;
