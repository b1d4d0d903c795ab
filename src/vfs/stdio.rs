//! The character/stdio driver (spec.md §4.4 "Character/stdio driver"):
//! wraps one [`Stream`] end per standard fd. A character device has no
//! directory structure to resolve paths against, so every `path_*`
//! operation falls through to the [`Driver`] trait's defaults
//! (`Errno::Notsup`/`Errno::Nosys`) rather than being overridden here.

use crate::driver::{Driver, DriverRights};
use crate::errno::{Errno, Result};
use crate::stream::Stream;
use crate::types::{Filestat, Filetype, RightsExt};
use std::any::Any;
use std::io;
use std::sync::Arc;

pub struct CharDriver {
    stream: Arc<Stream>,
    readable: bool,
    writable: bool,
}

impl CharDriver {
    pub fn new(stream: Arc<Stream>, readable: bool, writable: bool) -> Self {
        Self {
            stream,
            readable,
            writable,
        }
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }
}

impl Driver for CharDriver {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn try_clone(&self) -> io::Result<Box<dyn Driver>> {
        Ok(Box::new(Self {
            stream: Arc::clone(&self.stream),
            readable: self.readable,
            writable: self.writable,
        }))
    }

    fn file_type(&self) -> Filetype {
        Filetype::CharacterDevice
    }

    fn rights(&self) -> DriverRights {
        DriverRights::new(
            crate::types::Rights::character_device_base(),
            crate::types::Rights::character_device_inheriting(),
        )
    }

    fn fd_close(&self) -> Result<()> {
        self.stream.end();
        Ok(())
    }

    fn fd_filestat_get(&self) -> Result<Filestat> {
        Ok(Filestat {
            dev: 0,
            ino: 0,
            filetype: Filetype::CharacterDevice,
            nlink: 1,
            size: 0,
            atim: 0,
            mtim: 0,
            ctim: 0,
        })
    }

    fn fd_read(&self, bufs: &mut [&mut [u8]]) -> Result<usize> {
        if !self.readable {
            return Err(Errno::Badf);
        }
        let mut total = 0;
        for buf in bufs.iter_mut() {
            let chunk = self.stream.read(buf.len()).map_err(|_| Errno::Io)?;
            let n = chunk.len();
            buf[..n].copy_from_slice(&chunk);
            total += n;
            if n < buf.len() {
                break;
            }
        }
        Ok(total)
    }

    fn fd_write(&self, bufs: &[&[u8]]) -> Result<usize> {
        if !self.writable {
            return Err(Errno::Badf);
        }
        let mut total = 0;
        for buf in bufs {
            self.stream.write(buf).map_err(|_| Errno::Io)?;
            total += buf.len();
        }
        Ok(total)
    }

    fn fd_bytes_available(&self) -> Result<crate::types::Filesize> {
        Ok(self.stream.bytes_available())
    }
}
