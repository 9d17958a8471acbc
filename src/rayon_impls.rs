use crate::{HashTable, Key};
use rayon::iter::{FromParallelIterator, IntoParallelIterator, ParallelExtend, ParallelIterator};

impl<K, V> ParallelExtend<(K, V)> for HashTable<K, V>
where
    K: Key + Send + Sync,
    V: Send + Sync,
{
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        <&Self as ParallelExtend<(K, V)>>::par_extend(&mut &*self, par_iter);
    }
}

impl<K, V> ParallelExtend<(K, V)> for &HashTable<K, V>
where
    K: Key + Send + Sync,
    V: Send + Sync,
{
    fn par_extend<I>(&mut self, par_iter: I)
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        let table: &HashTable<K, V> = self;
        par_iter.into_par_iter().for_each(|(k, v)| {
            table.insert(k, v);
        });
    }
}

impl<K, V> FromParallelIterator<(K, V)> for HashTable<K, V>
where
    K: Key + Send + Sync,
    V: Send + Sync,
{
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = (K, V)>,
    {
        let mut created_table = HashTable::new();
        created_table.par_extend(par_iter);
        created_table
    }
}
