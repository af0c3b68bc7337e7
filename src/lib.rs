// SPDX-License-Identifier: Apache-2.0

pub mod access;
pub mod init;
pub mod worker;
